//! Deterministic replay of a trace against one engine.
//!
//! Time comes from a [`ManualClock`] stepped on the same grid a live
//! session ticks on: a sample every `tick_interval_ms`, counted from
//! mount. Each trace row is applied at its own timestamp, after every
//! sample due at or before it.

use std::time::Duration;

use watchgate::clock::{ManualClock, Timestamp};
use watchgate::config::{ConfigError, GateConfig};
use watchgate::engine::{self, EngagementSnapshot, Engine, Signal};
use watchgate::playback::{NativeEvent, PlaybackSignalAdapter};
use watchgate::tracing::prelude::*;
use watchgate::visibility::{Visibility, VisibilityMonitor};

use crate::trace::{TraceEvent, TraceRow};

/// One applied trace row.
#[derive(Debug, Clone)]
pub struct Step {
    pub at_ms: u64,
    pub event: TraceEvent,
    /// Signals the event produced after adapter and monitor filtering.
    pub signals: Vec<Signal>,
    pub snapshot: EngagementSnapshot,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub steps: Vec<Step>,
    pub unlocked_at_ms: Option<u64>,
    pub end_ms: u64,
    pub snapshot: EngagementSnapshot,
}

struct Replay {
    clock: ManualClock,
    engine: Box<dyn Engine>,
    adapter: PlaybackSignalAdapter,
    monitor: VisibilityMonitor,
    tick_ms: u64,
    now_ms: u64,
    unlocked_at_ms: Option<u64>,
}

impl Replay {
    fn new(config: &GateConfig) -> Result<Self, ConfigError> {
        let clock = ManualClock::new();
        Ok(Self {
            engine: engine::build(config, clock.clone())?,
            clock,
            adapter: PlaybackSignalAdapter::new(),
            monitor: VisibilityMonitor::new(),
            tick_ms: config.tick_interval_ms,
            now_ms: 0,
            unlocked_at_ms: None,
        })
    }

    /// Take every sample due up to `target_ms`, then move the clock there.
    fn run_until(&mut self, target_ms: u64) {
        loop {
            let next_tick = (self.now_ms / self.tick_ms + 1) * self.tick_ms;
            if next_tick > target_ms || self.engine.snapshot().unlocked() {
                break;
            }
            self.set_time(next_tick);
            if self.engine.sample() && self.unlocked_at_ms.is_none() && self.engine.snapshot().unlocked() {
                debug!(at_ms = next_tick, "Unlocked during replay");
                self.unlocked_at_ms = Some(next_tick);
            }
        }
        self.set_time(target_ms);
    }

    fn set_time(&mut self, at_ms: u64) {
        if at_ms > self.now_ms {
            self.now_ms = at_ms;
            self.clock
                .advance_to(Timestamp::from_duration(Duration::from_millis(at_ms)));
        }
    }

    fn apply(&mut self, row: &TraceRow) -> Step {
        self.run_until(row.t_ms);

        let signals: Vec<Signal> = match row.event {
            TraceEvent::Click => {
                self.adapter.bind();
                self.playback(NativeEvent::Play)
            }
            TraceEvent::Play => self.playback(NativeEvent::Play),
            TraceEvent::Pause => self.playback(NativeEvent::Pause),
            TraceEvent::End => self.playback(NativeEvent::End),
            TraceEvent::Seek => self.playback(NativeEvent::SecondChange {
                position_secs: row.value.unwrap_or(0.0),
                duration_secs: 100.0,
            }),
            TraceEvent::Hide => self.visibility(Visibility::Background),
            TraceEvent::Show => self.visibility(Visibility::Foreground),
        };

        for signal in &signals {
            self.engine.apply(*signal);
        }

        Step {
            at_ms: row.t_ms,
            event: row.event,
            signals,
            snapshot: self.engine.snapshot(),
        }
    }

    fn playback(&self, event: NativeEvent) -> Vec<Signal> {
        self.adapter
            .handle(event)
            .into_iter()
            .map(Signal::from)
            .collect()
    }

    fn visibility(&self, visibility: Visibility) -> Vec<Signal> {
        if self.monitor.set(visibility) {
            vec![Signal::Visibility(visibility)]
        } else {
            Vec::new()
        }
    }
}

/// Replay `rows`, continuing to sample until `until_ms` if it lies past
/// the last row.
pub fn replay(
    config: &GateConfig,
    rows: &[TraceRow],
    until_ms: Option<u64>,
) -> Result<Outcome, ConfigError> {
    let mut replay = Replay::new(config)?;
    let steps: Vec<Step> = rows.iter().map(|row| replay.apply(row)).collect();

    let last_ms = rows.last().map_or(0, |row| row.t_ms);
    let end_ms = until_ms.unwrap_or(last_ms).max(last_ms);
    replay.run_until(end_ms);

    Ok(Outcome {
        steps,
        unlocked_at_ms: replay.unlocked_at_ms,
        end_ms,
        snapshot: replay.engine.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use watchgate::config::EngineStrategy;
    use watchgate::playback::PlaybackSignal;

    use super::*;

    fn is_progress(signal: &Signal) -> bool {
        matches!(signal, Signal::Playback(PlaybackSignal::Progress(_)))
    }

    fn row(t_ms: u64, event: TraceEvent) -> TraceRow {
        TraceRow {
            t_ms,
            event,
            value: None,
        }
    }

    fn config(threshold: f64, engine: EngineStrategy) -> GateConfig {
        GateConfig {
            required_threshold_secs: threshold,
            engine,
            ..GateConfig::default()
        }
    }

    #[test]
    fn pause_and_resume_unlocks_at_total_watch_time() {
        let rows = [
            row(0, TraceEvent::Click),
            row(40_000, TraceEvent::Pause),
            row(60_000, TraceEvent::Play),
        ];
        let outcome = replay(&config(75.0, EngineStrategy::WatchTime), &rows, Some(120_000)).unwrap();

        assert_eq!(outcome.steps[1].snapshot.elapsed_secs, 40.0);
        assert_eq!(outcome.unlocked_at_ms, Some(95_000));
        assert!(outcome.snapshot.unlocked());
    }

    #[test]
    fn hidden_page_does_not_count() {
        let rows = [
            row(0, TraceEvent::Click),
            row(10_000, TraceEvent::Hide),
            row(50_000, TraceEvent::Show),
        ];
        let outcome = replay(&config(75.0, EngineStrategy::WatchTime), &rows, Some(100_000)).unwrap();

        assert_eq!(outcome.snapshot.elapsed_secs, 10.0);
        assert_eq!(outcome.unlocked_at_ms, None);
    }

    #[test]
    fn play_before_click_is_ignored() {
        let rows = [row(0, TraceEvent::Play)];
        let outcome = replay(&config(5.0, EngineStrategy::WatchTime), &rows, Some(10_000)).unwrap();

        assert!(outcome.steps[0].signals.is_empty());
        assert_eq!(outcome.snapshot.elapsed_secs, 0.0);
    }

    #[test]
    fn countdown_unlocks_without_any_events() {
        let outcome = replay(&config(90.0, EngineStrategy::Countdown), &[], Some(120_000)).unwrap();

        assert_eq!(outcome.unlocked_at_ms, Some(90_000));
        assert_eq!(outcome.end_ms, 120_000);
    }

    #[test]
    fn seek_reports_crossed_quartiles() {
        let rows = [
            row(0, TraceEvent::Click),
            TraceRow {
                t_ms: 1_000,
                event: TraceEvent::Seek,
                value: Some(60.0),
            },
        ];
        let outcome = replay(&config(75.0, EngineStrategy::WatchTime), &rows, None).unwrap();

        let progress = outcome.steps[1].signals.iter().filter(|s| is_progress(s)).count();
        assert_eq!(progress, 2);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = GateConfig {
            tick_interval_ms: 0,
            ..GateConfig::default()
        };
        assert!(replay(&config, &[], None).is_err());
    }
}
