//! Timestamp sources.
//!
//! Engines never read the system time directly; they ask a [`Clock`].
//! Which clock backs an engine decides how it behaves when the host
//! throttles the page:
//!
//! - [`MonotonicClock`] follows the runtime's monotonic time. Under a
//!   paused or suspended scheduler it stops with everything else.
//! - [`WallClock`] measures `now - start` on the calendar clock, so it
//!   keeps advancing through throttling and suspension.
//! - [`ManualClock`] only moves when told to. Tests and trace replay use
//!   it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use time::OffsetDateTime;

/// Offset from a clock's origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Self = Self(Duration::ZERO);

    pub fn from_duration(offset: Duration) -> Self {
        Self(offset)
    }

    /// Negative and non-finite inputs map to [`Timestamp::ZERO`].
    pub fn from_secs_f64(secs: f64) -> Self {
        Self(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Seconds from `earlier` to `self`; zero if `earlier` is later.
    pub fn secs_since(self, earlier: Timestamp) -> f64 {
        self.0.saturating_sub(earlier.0).as_secs_f64()
    }
}

pub trait Clock: Send + Sync {
    /// Current reading. Successive readings never decrease.
    fn now(&self) -> Timestamp;
}

/// Runtime-monotonic clock, ticking with tokio's notion of time.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed())
    }
}

type WallSource = Box<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Calendar-time clock: `current wall time - start wall time`.
///
/// System clock adjustments can move wall time backwards. Readings are
/// held at their previous high-water mark until wall time catches up.
pub struct WallClock {
    source: WallSource,
    start: OffsetDateTime,
    last: Mutex<Duration>,
}

impl WallClock {
    pub fn new() -> Self {
        Self::with_source(OffsetDateTime::now_utc)
    }

    pub fn with_source(source: impl Fn() -> OffsetDateTime + Send + Sync + 'static) -> Self {
        let start = source();
        Self {
            source: Box::new(source),
            start,
            last: Mutex::new(Duration::ZERO),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WallClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WallClock")
            .field("start", &self.start)
            .field("last", &*self.last.lock())
            .finish()
    }
}

impl Clock for WallClock {
    fn now(&self) -> Timestamp {
        let elapsed = Duration::try_from((self.source)() - self.start).unwrap_or(Duration::ZERO);
        let mut last = self.last.lock();
        *last = (*last).max(elapsed);
        Timestamp(*last)
    }
}

/// Clock that moves only when advanced. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    reading: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut reading = self.reading.lock();
        *reading = reading.saturating_add(by);
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO));
    }

    /// Move to `at`. Earlier values are ignored.
    pub fn advance_to(&self, at: Timestamp) {
        let mut reading = self.reading.lock();
        *reading = (*reading).max(at.0);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(*self.reading.lock())
    }
}
