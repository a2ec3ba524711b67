//! Playback signal adapter.
//!
//! The embedded player reports whatever its vendor API happens to emit:
//! named events with loosely typed payloads, registered through a global
//! push queue once the player is ready. This adapter is the only place
//! that knows about that. Everything downstream sees exactly two gating
//! signals, [`PlaybackSignal::Started`] and [`PlaybackSignal::Stopped`],
//! plus a reporting-only [`PlaybackSignal::Progress`].
//!
//! Binding is lazy. Until the visitor presses play and the live player
//! comes up, [`PlaybackSignalAdapter::bind`] has not been called and
//! every native event is dropped, so nothing can be counted.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::tracing::prelude::*;
use crate::types::{Observers, Subscription};

/// Quarter marks of the video's duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Quartile {
    Q25,
    Q50,
    Q75,
    Q100,
}

impl Quartile {
    pub const ALL: [Quartile; 4] = [Quartile::Q25, Quartile::Q50, Quartile::Q75, Quartile::Q100];

    pub fn percent(self) -> u8 {
        match self {
            Quartile::Q25 => 25,
            Quartile::Q50 => 50,
            Quartile::Q75 => 75,
            Quartile::Q100 => 100,
        }
    }

    pub fn from_percent(percent: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.percent() == percent)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Quartile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.percent())
    }
}

/// Normalized playback signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackSignal {
    Started,
    Stopped,
    /// Reporting only; never affects the gate.
    Progress(Quartile),
}

/// Event as delivered by the player.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    Play,
    Pause,
    End,
    Error,
    /// Periodic position update.
    SecondChange {
        position_secs: f64,
        duration_secs: f64,
    },
    /// Anything else the vendor emits.
    Other(String),
}

impl NativeEvent {
    /// Interpret a vendor event from its bind name and payload.
    ///
    /// Position updates carry `{"time": <secs>, "duration": <secs>}`;
    /// missing or non-numeric fields read as zero and are later ignored.
    pub fn from_vendor(name: &str, payload: &Value) -> Self {
        match name {
            "play" => NativeEvent::Play,
            "pause" => NativeEvent::Pause,
            "end" => NativeEvent::End,
            "error" => NativeEvent::Error,
            "secondchange" | "timechange" => NativeEvent::SecondChange {
                position_secs: payload.get("time").and_then(Value::as_f64).unwrap_or(0.0),
                duration_secs: payload
                    .get("duration")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
            },
            other => NativeEvent::Other(other.to_string()),
        }
    }
}

/// Capability the engine consumes: something that emits playback
/// signals to subscribers.
pub trait VideoSource: Send + Sync {
    fn subscribe(&self, callback: Box<dyn Fn(&PlaybackSignal) + Send + Sync>) -> Subscription;
}

#[derive(Debug, Default)]
struct AdapterState {
    bound: bool,
    playing: bool,
    reported: [bool; 4],
}

/// Translates native player events into [`PlaybackSignal`]s.
///
/// Clones share state and subscribers.
#[derive(Debug, Clone)]
pub struct PlaybackSignalAdapter {
    state: Arc<Mutex<AdapterState>>,
    observers: Observers<PlaybackSignal>,
}

impl PlaybackSignalAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AdapterState::default())),
            observers: Observers::new(),
        }
    }

    /// Attach to the live player. Called from the player's ready hook,
    /// after the visitor has pressed play. Returns `false` if already
    /// bound.
    pub fn bind(&self) -> bool {
        let mut state = self.state.lock();
        if state.bound {
            return false;
        }
        state.bound = true;
        info!("Playback adapter bound to live player");
        true
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().bound
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    /// Translate a vendor event by name. See [`NativeEvent::from_vendor`].
    pub fn handle_vendor(&self, name: &str, payload: &Value) -> Vec<PlaybackSignal> {
        self.handle(NativeEvent::from_vendor(name, payload))
    }

    /// Translate `event`, notify subscribers and return what was emitted.
    pub fn handle(&self, event: NativeEvent) -> Vec<PlaybackSignal> {
        let signals = {
            let mut state = self.state.lock();
            if !state.bound {
                trace!(?event, "Dropping native event before bind");
                return Vec::new();
            }
            translate(&mut state, &event)
        };

        for signal in &signals {
            debug!(?signal, "Playback signal");
            self.observers.notify(signal);
        }

        signals
    }
}

impl Default for PlaybackSignalAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSource for PlaybackSignalAdapter {
    fn subscribe(&self, callback: Box<dyn Fn(&PlaybackSignal) + Send + Sync>) -> Subscription {
        self.observers.subscribe(callback)
    }
}

fn translate(state: &mut AdapterState, event: &NativeEvent) -> Vec<PlaybackSignal> {
    match event {
        NativeEvent::Play => {
            if state.playing {
                return Vec::new();
            }
            state.playing = true;
            vec![PlaybackSignal::Started]
        }
        NativeEvent::Pause | NativeEvent::End | NativeEvent::Error => {
            if !state.playing {
                return Vec::new();
            }
            state.playing = false;
            vec![PlaybackSignal::Stopped]
        }
        NativeEvent::SecondChange {
            position_secs,
            duration_secs,
        } => crossed_quartiles(state, *position_secs, *duration_secs),
        NativeEvent::Other(name) => {
            trace!(name = %name, "Ignoring native event");
            Vec::new()
        }
    }
}

/// Quartiles reached at this position that have not been reported yet.
///
/// The position percentage is rounded before comparison, so 24.6% counts
/// as reaching the 25% mark. A seek past several marks reports each of
/// them, in order.
fn crossed_quartiles(state: &mut AdapterState, position: f64, duration: f64) -> Vec<PlaybackSignal> {
    if !position.is_finite() || !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }

    let percent = (position / duration * 100.0).round();
    let mut crossed = Vec::new();
    for quartile in Quartile::ALL {
        if percent >= f64::from(quartile.percent()) && !state.reported[quartile.index()] {
            state.reported[quartile.index()] = true;
            crossed.push(PlaybackSignal::Progress(quartile));
        }
    }
    crossed
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn bound_adapter() -> PlaybackSignalAdapter {
        let adapter = PlaybackSignalAdapter::new();
        adapter.bind();
        adapter
    }

    fn position(position_secs: f64, duration_secs: f64) -> NativeEvent {
        NativeEvent::SecondChange {
            position_secs,
            duration_secs,
        }
    }

    #[test]
    fn ignores_events_before_bind() {
        let adapter = PlaybackSignalAdapter::new();
        assert!(adapter.handle(NativeEvent::Play).is_empty());
        assert!(!adapter.is_playing());
    }

    #[test]
    fn bind_is_one_shot() {
        let adapter = PlaybackSignalAdapter::new();
        assert!(adapter.bind());
        assert!(!adapter.bind());
        assert!(adapter.is_bound());
    }

    #[test]
    fn play_emits_started() {
        let adapter = bound_adapter();
        assert_eq!(adapter.handle(NativeEvent::Play), vec![PlaybackSignal::Started]);
    }

    #[test]
    fn repeated_play_is_a_no_op() {
        let adapter = bound_adapter();
        adapter.handle(NativeEvent::Play);
        assert!(adapter.handle(NativeEvent::Play).is_empty());
    }

    #[test]
    fn pause_and_end_emit_stopped_once() {
        let adapter = bound_adapter();
        adapter.handle(NativeEvent::Play);

        assert_eq!(adapter.handle(NativeEvent::Pause), vec![PlaybackSignal::Stopped]);
        assert!(adapter.handle(NativeEvent::End).is_empty());
    }

    #[test]
    fn stop_before_play_is_a_no_op() {
        let adapter = bound_adapter();
        assert!(adapter.handle(NativeEvent::Pause).is_empty());
    }

    #[test]
    fn end_counts_as_stopped() {
        let adapter = bound_adapter();
        adapter.handle(NativeEvent::Play);
        assert_eq!(adapter.handle(NativeEvent::End), vec![PlaybackSignal::Stopped]);
    }

    #[test]
    fn quartiles_are_reported_once() {
        let adapter = bound_adapter();

        assert_eq!(
            adapter.handle(position(25.0, 100.0)),
            vec![PlaybackSignal::Progress(Quartile::Q25)]
        );
        assert!(adapter.handle(position(26.0, 100.0)).is_empty());
        assert!(adapter.handle(position(25.0, 100.0)).is_empty());
    }

    #[test]
    fn seek_reports_every_crossed_quartile_in_order() {
        let adapter = bound_adapter();

        assert_eq!(
            adapter.handle(position(80.0, 100.0)),
            vec![
                PlaybackSignal::Progress(Quartile::Q25),
                PlaybackSignal::Progress(Quartile::Q50),
                PlaybackSignal::Progress(Quartile::Q75),
            ]
        );
    }

    #[test]
    fn rounding_reaches_a_mark_early() {
        let adapter = bound_adapter();
        assert_eq!(
            adapter.handle(position(49.6, 100.0)),
            vec![
                PlaybackSignal::Progress(Quartile::Q25),
                PlaybackSignal::Progress(Quartile::Q50),
            ]
        );
    }

    #[test]
    fn zero_duration_reports_nothing() {
        let adapter = bound_adapter();
        assert!(adapter.handle(position(10.0, 0.0)).is_empty());
    }

    #[test]
    fn parses_vendor_events() {
        assert_eq!(NativeEvent::from_vendor("play", &Value::Null), NativeEvent::Play);
        assert_eq!(
            NativeEvent::from_vendor("secondchange", &json!({"time": 30, "duration": 120.0})),
            position(30.0, 120.0)
        );
        assert_eq!(
            NativeEvent::from_vendor("volumechange", &json!({})),
            NativeEvent::Other("volumechange".into())
        );
    }

    #[test]
    fn subscribers_receive_signals() {
        let adapter = bound_adapter();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = VideoSource::subscribe(
            &adapter,
            Box::new(move |signal: &PlaybackSignal| sink.lock().push(*signal)),
        );

        adapter.handle_vendor("play", &Value::Null);
        adapter.handle_vendor("pause", &Value::Null);

        assert_eq!(
            *seen.lock(),
            vec![PlaybackSignal::Started, PlaybackSignal::Stopped]
        );
    }

    #[test]
    fn quartile_percent_round_trips() {
        for quartile in Quartile::ALL {
            assert_eq!(Quartile::from_percent(quartile.percent()), Some(quartile));
        }
        assert_eq!(Quartile::from_percent(30), None);
    }
}
