//! Countdown engine: unlock after a fixed amount of time since mount.
//!
//! No playback or visibility signal affects the count. Elapsed time is
//! simply `now - mount`, clamped to the threshold and never allowed to
//! decrease. Backed by a wall clock, this keeps counting while the page
//! is hidden and therefore credits time the visitor may not have spent
//! watching. Deployments that need actual engagement use the watch-time
//! accumulator instead.

use crate::clock::{Clock, Timestamp};
use crate::config::EngineStrategy;
use crate::engine::{EngagementSnapshot, Engine, Phase, Signal};
use crate::playback::PlaybackSignal;
use crate::tracing::prelude::*;

#[derive(Debug)]
pub struct CountdownEngine<C> {
    clock: C,
    mounted_at: Timestamp,
    threshold_secs: f64,
    elapsed_secs: f64,
    // Tracked for display only.
    is_playing: bool,
    is_foreground: bool,
}

impl<C: Clock> CountdownEngine<C> {
    /// Start counting from the clock's current reading.
    pub fn new(clock: C, threshold_secs: f64) -> Self {
        let mounted_at = clock.now();
        Self {
            clock,
            mounted_at,
            threshold_secs,
            elapsed_secs: 0.0,
            is_playing: false,
            is_foreground: true,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn is_saturated(&self) -> bool {
        self.elapsed_secs >= self.threshold_secs
    }
}

impl<C: Clock> Engine for CountdownEngine<C> {
    fn strategy(&self) -> EngineStrategy {
        EngineStrategy::Countdown
    }

    fn apply(&mut self, signal: Signal) -> bool {
        let before = (self.is_playing, self.is_foreground);
        match signal {
            Signal::Playback(PlaybackSignal::Started) => self.is_playing = true,
            Signal::Playback(PlaybackSignal::Stopped) => self.is_playing = false,
            Signal::Playback(PlaybackSignal::Progress(_)) => {}
            Signal::Visibility(visibility) => self.is_foreground = visibility.is_foreground(),
        }
        before != (self.is_playing, self.is_foreground)
    }

    fn sample(&mut self) -> bool {
        if self.is_saturated() {
            return false;
        }

        let since_mount = self.clock.now().secs_since(self.mounted_at);
        let next = since_mount.min(self.threshold_secs).max(self.elapsed_secs);
        if next == self.elapsed_secs {
            return false;
        }

        self.elapsed_secs = next;
        if self.is_saturated() {
            info!(
                threshold_secs = self.threshold_secs,
                "Countdown threshold reached"
            );
        }
        true
    }

    fn snapshot(&self) -> EngagementSnapshot {
        EngagementSnapshot {
            strategy: EngineStrategy::Countdown,
            phase: if self.is_saturated() {
                Phase::Saturated
            } else {
                Phase::Accumulating
            },
            elapsed_secs: self.elapsed_secs,
            threshold_secs: self.threshold_secs,
            is_playing: self.is_playing,
            is_foreground: self.is_foreground,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::visibility::Visibility;

    #[test]
    fn unlocks_after_threshold_of_wall_time() {
        let clock = ManualClock::new();
        let mut engine = CountdownEngine::new(clock.clone(), 90.0);
        assert!(!engine.snapshot().unlocked());

        clock.advance(Duration::from_secs(89));
        engine.sample();
        assert!(!engine.snapshot().unlocked());

        clock.advance(Duration::from_secs(1));
        engine.sample();
        assert!(engine.snapshot().unlocked());
        assert_eq!(engine.snapshot().phase, Phase::Saturated);
    }

    #[test]
    fn one_late_sample_catches_up_fully() {
        let clock = ManualClock::new();
        let mut engine = CountdownEngine::new(clock.clone(), 90.0);

        clock.advance(Duration::from_secs(300));
        engine.sample();

        assert_eq!(engine.elapsed_secs(), 90.0);
    }

    #[test]
    fn counts_from_mount_not_from_clock_origin() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(40));
        let mut engine = CountdownEngine::new(clock.clone(), 90.0);

        clock.advance(Duration::from_secs(10));
        engine.sample();

        assert_eq!(engine.elapsed_secs(), 10.0);
    }

    #[test]
    fn ignores_playback_and_visibility() {
        let clock = ManualClock::new();
        let mut engine = CountdownEngine::new(clock.clone(), 90.0);

        engine.apply(Signal::Visibility(Visibility::Background));
        engine.apply(Signal::Playback(PlaybackSignal::Stopped));
        clock.advance(Duration::from_secs(30));
        engine.sample();

        assert_eq!(engine.elapsed_secs(), 30.0);
        assert!(!engine.snapshot().is_foreground);
    }

    #[test]
    fn sample_without_time_passing_reports_no_change() {
        let clock = ManualClock::new();
        let mut engine = CountdownEngine::new(clock.clone(), 90.0);
        assert!(!engine.sample());
    }
}
