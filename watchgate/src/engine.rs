//! The engine contract shared by both measuring strategies.
//!
//! An engine owns the engagement state for one page view. It is driven
//! by two kinds of input: edge-triggered [`Signal`]s and periodic
//! [`Engine::sample`] ticks. Each call is one atomic transition; callers
//! read the outcome through [`Engine::snapshot`].

use serde::Serialize;

use crate::accumulator::EngagementAccumulator;
use crate::clock::{Clock, MonotonicClock, WallClock};
use crate::config::{ConfigError, EngineStrategy, GateConfig};
use crate::countdown::CountdownEngine;
use crate::gate;
use crate::playback::PlaybackSignal;
use crate::visibility::Visibility;

/// One edge-triggered input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Playback(PlaybackSignal),
    Visibility(Visibility),
}

impl From<PlaybackSignal> for Signal {
    fn from(signal: PlaybackSignal) -> Self {
        Signal::Playback(signal)
    }
}

impl From<Visibility> for Signal {
    fn from(visibility: Visibility) -> Self {
        Signal::Visibility(visibility)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Not counting; no baseline.
    Idle,
    /// Counting from a live baseline.
    Accumulating,
    /// Threshold reached. Absorbing.
    Saturated,
}

/// Consistent view of an engine at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngagementSnapshot {
    pub strategy: EngineStrategy,
    pub phase: Phase,
    pub elapsed_secs: f64,
    pub threshold_secs: f64,
    pub is_playing: bool,
    pub is_foreground: bool,
}

impl EngagementSnapshot {
    pub fn unlocked(&self) -> bool {
        gate::is_unlocked(self.elapsed_secs, self.threshold_secs)
    }

    pub fn remaining_secs(&self) -> f64 {
        (self.threshold_secs - self.elapsed_secs).max(0.0)
    }
}

pub trait Engine: Send {
    fn strategy(&self) -> EngineStrategy;

    /// Apply one signal. Returns `true` if the snapshot changed.
    fn apply(&mut self, signal: Signal) -> bool;

    /// Take one clock sample. Returns `true` if the snapshot changed.
    fn sample(&mut self) -> bool;

    fn snapshot(&self) -> EngagementSnapshot;
}

/// Build the engine `config` asks for, reading time from `clock`.
///
/// Fails if `config` does not validate. A gate built from a bad
/// threshold would either never close or never open.
pub fn build<C: Clock + 'static>(
    config: &GateConfig,
    clock: C,
) -> Result<Box<dyn Engine>, ConfigError> {
    config.validate()?;

    let engine: Box<dyn Engine> = match config.engine {
        EngineStrategy::Countdown => {
            Box::new(CountdownEngine::new(clock, config.required_threshold_secs))
        }
        EngineStrategy::WatchTime => Box::new(EngagementAccumulator::new(
            clock,
            config.required_threshold_secs,
            config.max_sample_delta_secs,
        )),
    };
    Ok(engine)
}

/// Build the engine `config` asks for with the clock that suits it: the
/// countdown must keep advancing while the host throttles the page, so
/// it reads wall time; watch time follows the runtime's monotonic clock.
pub fn build_with_default_clock(config: &GateConfig) -> Result<Box<dyn Engine>, ConfigError> {
    match config.engine {
        EngineStrategy::Countdown => build(config, WallClock::new()),
        EngineStrategy::WatchTime => build(config, MonotonicClock::new()),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn builds_requested_strategy() {
        let countdown = GateConfig {
            engine: EngineStrategy::Countdown,
            ..GateConfig::default()
        };
        let watch_time = GateConfig::default();

        assert_eq!(
            build(&countdown, ManualClock::new()).unwrap().strategy(),
            EngineStrategy::Countdown
        );
        assert_eq!(
            build(&watch_time, ManualClock::new()).unwrap().strategy(),
            EngineStrategy::WatchTime
        );
    }

    #[test]
    fn snapshot_remaining_never_negative() {
        let snapshot = EngagementSnapshot {
            strategy: EngineStrategy::WatchTime,
            phase: Phase::Saturated,
            elapsed_secs: 75.0,
            threshold_secs: 75.0,
            is_playing: true,
            is_foreground: true,
        };

        assert!(snapshot.unlocked());
        assert_eq!(snapshot.remaining_secs(), 0.0);
    }

    #[test]
    fn fresh_engines_are_locked() {
        let config = GateConfig {
            required_threshold_secs: 90.0,
            ..GateConfig::default()
        };
        for strategy in [EngineStrategy::Countdown, EngineStrategy::WatchTime] {
            let config = GateConfig {
                engine: strategy,
                ..config.clone()
            };
            let engine = build(&config, ManualClock::new()).unwrap();
            let snapshot = engine.snapshot();

            assert!(!snapshot.unlocked());
            assert_eq!(snapshot.elapsed_secs, 0.0);
            assert_eq!(snapshot.threshold_secs, 90.0);
        }
    }

    #[test_case(f64::NAN, 250; "nan threshold")]
    #[test_case(-5.0, 250; "negative threshold")]
    #[test_case(0.0, 250; "zero threshold")]
    #[test_case(75.0, 0; "zero tick interval")]
    fn rejects_invalid_config(threshold: f64, tick_interval_ms: u64) {
        for engine in [EngineStrategy::Countdown, EngineStrategy::WatchTime] {
            let config = GateConfig {
                required_threshold_secs: threshold,
                tick_interval_ms,
                engine,
                ..GateConfig::default()
            };
            assert!(build(&config, ManualClock::new()).is_err());
        }
    }
}
