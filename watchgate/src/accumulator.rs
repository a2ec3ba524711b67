//! Watch-time accumulator: the engine that only counts attentive,
//! foreground play time.
//!
//! # State Machine
//!
//! ```text
//!          Started & foreground          elapsed == threshold
//!  Idle ─────────────────────────► Accumulating ────────────────► Saturated
//!   ▲                                 │    ▲ │
//!   │   Stopped / background          │    │ │ sample
//!   └─────────────────────────────────┘    └─┘
//! ```
//!
//! - **Idle:** No baseline. Elapsed time is frozen. A foreground edge
//!   alone does not leave this state; a fresh `Started` is required.
//! - **Accumulating:** Playing and in the foreground. Each sample adds
//!   the time since the previous reading and moves the baseline forward.
//! - **Saturated:** Threshold reached. Signals are still accepted but
//!   elapsed never changes again.
//!
//! A background edge clears the baseline without crediting the partial
//! interval since the last sample, and clears the playing flag. Counting
//! therefore undercounts rather than overcounts attention.
//!
//! Each sample's contribution is capped at `max_sample_delta_secs`. A
//! stalled scheduler or a clock jump can therefore never jump the gate
//! straight to unlocked.

use crate::clock::{Clock, Timestamp};
use crate::config::EngineStrategy;
use crate::engine::{EngagementSnapshot, Engine, Phase, Signal};
use crate::playback::PlaybackSignal;
use crate::tracing::prelude::*;
use crate::visibility::Visibility;

/// Engagement state owned by the accumulator.
///
/// `last_sample` is `None` whenever `is_playing` or `is_foreground` is
/// false, and after saturation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngagementState {
    pub elapsed_engaged_secs: f64,
    pub is_playing: bool,
    pub last_sample: Option<Timestamp>,
    pub is_foreground: bool,
}

impl EngagementState {
    fn initial() -> Self {
        Self {
            elapsed_engaged_secs: 0.0,
            is_playing: false,
            last_sample: None,
            is_foreground: true,
        }
    }
}

#[derive(Debug)]
pub struct EngagementAccumulator<C> {
    clock: C,
    threshold_secs: f64,
    max_sample_delta_secs: f64,
    state: EngagementState,
}

impl<C: Clock> EngagementAccumulator<C> {
    /// Start idle, in the foreground, with nothing accumulated.
    pub fn new(clock: C, threshold_secs: f64, max_sample_delta_secs: f64) -> Self {
        Self {
            clock,
            threshold_secs,
            max_sample_delta_secs,
            state: EngagementState::initial(),
        }
    }

    pub fn state(&self) -> &EngagementState {
        &self.state
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.state.elapsed_engaged_secs
    }

    pub fn threshold_secs(&self) -> f64 {
        self.threshold_secs
    }

    pub fn phase(&self) -> Phase {
        if self.is_saturated() {
            Phase::Saturated
        } else if self.state.last_sample.is_some() {
            Phase::Accumulating
        } else {
            Phase::Idle
        }
    }

    pub fn is_saturated(&self) -> bool {
        self.state.elapsed_engaged_secs >= self.threshold_secs
    }

    /// The player started. Records a baseline if in the foreground and
    /// not already counting. Previously accumulated time is kept.
    pub fn start(&mut self) -> bool {
        let before = self.state;
        self.state.is_playing = true;

        if self.state.is_foreground && self.state.last_sample.is_none() && !self.is_saturated() {
            self.state.last_sample = Some(self.clock.now());
            debug!(
                elapsed_secs = self.state.elapsed_engaged_secs,
                "Accumulation started"
            );
        }

        self.state != before
    }

    /// The player paused or ended. Elapsed is kept as of the last sample.
    pub fn stop(&mut self) -> bool {
        let before = self.state;
        self.state.is_playing = false;
        self.state.last_sample = None;

        if before.last_sample.is_some() {
            debug!(
                elapsed_secs = self.state.elapsed_engaged_secs,
                "Accumulation stopped"
            );
        }

        self.state != before
    }

    /// Foreground/background edge.
    pub fn set_visibility(&mut self, visibility: Visibility) -> bool {
        let before = self.state;
        self.state.is_foreground = visibility.is_foreground();

        if !self.state.is_foreground {
            self.state.is_playing = false;
            self.state.last_sample = None;
            if before.last_sample.is_some() {
                debug!(
                    elapsed_secs = self.state.elapsed_engaged_secs,
                    "Accumulation dropped on background"
                );
            }
        }

        self.state != before
    }

    /// Credit the time since the last sample.
    pub fn tick(&mut self) -> bool {
        let Some(baseline) = self.state.last_sample else {
            return false;
        };

        let now = self.clock.now();
        let raw_delta = now.secs_since(baseline);
        let delta = raw_delta.min(self.max_sample_delta_secs).max(0.0);
        if raw_delta > delta {
            warn!(
                raw_delta_secs = raw_delta,
                credited_secs = delta,
                "Sample interval exceeds cap; crediting capped amount"
            );
        }

        let before = self.state;
        self.state.elapsed_engaged_secs = (self.state.elapsed_engaged_secs + delta)
            .min(self.threshold_secs)
            .max(0.0);

        if self.is_saturated() {
            self.state.last_sample = None;
            info!(
                threshold_secs = self.threshold_secs,
                "Watch-time threshold reached"
            );
        } else {
            self.state.last_sample = Some(now);
        }

        self.state.elapsed_engaged_secs != before.elapsed_engaged_secs
            || self.state.last_sample.is_none()
    }
}

impl<C: Clock> Engine for EngagementAccumulator<C> {
    fn strategy(&self) -> EngineStrategy {
        EngineStrategy::WatchTime
    }

    fn apply(&mut self, signal: Signal) -> bool {
        match signal {
            Signal::Playback(PlaybackSignal::Started) => self.start(),
            Signal::Playback(PlaybackSignal::Stopped) => self.stop(),
            Signal::Playback(PlaybackSignal::Progress(_)) => false,
            Signal::Visibility(visibility) => self.set_visibility(visibility),
        }
    }

    fn sample(&mut self) -> bool {
        self.tick()
    }

    fn snapshot(&self) -> EngagementSnapshot {
        EngagementSnapshot {
            strategy: EngineStrategy::WatchTime,
            phase: self.phase(),
            elapsed_secs: self.state.elapsed_engaged_secs,
            threshold_secs: self.threshold_secs,
            is_playing: self.state.is_playing,
            is_foreground: self.state.is_foreground,
        }
    }
}
