//! Gate session: the task that owns one engine for one page view.
//!
//! Visibility edges and playback signals arrive through an unbounded
//! channel in the order they happened. The run loop interleaves them
//! with periodic samples, one event at a time, and publishes a whole
//! [`EngagementSnapshot`] through a watch channel after every change.
//! Readers hold a [`GateHandle`] and never touch the engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, GateConfig};
use crate::engine::{EngagementSnapshot, Engine, Signal};
use crate::gate::GateView;
use crate::playback::{PlaybackSignal, VideoSource};
use crate::reporting::{ReportSink, events, report_quietly};
use crate::tracing::prelude::*;
use crate::types::Subscription;
use crate::visibility::VisibilityMonitor;

pub struct GateSession {
    engine: Box<dyn Engine>,
    tick_interval: Duration,
    reporter: Arc<dyn ReportSink>,
    signal_tx: mpsc::UnboundedSender<Signal>,
    signal_rx: mpsc::UnboundedReceiver<Signal>,
    snapshot_tx: watch::Sender<EngagementSnapshot>,
    subscriptions: Vec<Subscription>,
    unlock_reported: bool,
}

impl GateSession {
    /// Fails if `config` does not validate; the tick interval must be
    /// non-zero.
    pub fn new(
        config: &GateConfig,
        engine: Box<dyn Engine>,
        reporter: Arc<dyn ReportSink>,
    ) -> Result<(Self, GateHandle), ConfigError> {
        config.validate()?;

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());

        let session = Self {
            engine,
            tick_interval: config.tick_interval(),
            reporter,
            signal_tx,
            signal_rx,
            snapshot_tx,
            subscriptions: Vec::new(),
            unlock_reported: false,
        };
        let handle = GateHandle { rx: snapshot_rx };

        Ok((session, handle))
    }

    /// Follow `monitor`, then apply its current state, so a session
    /// mounted on a hidden page starts in the background. The state read
    /// after subscribing can repeat an edge already queued; engines
    /// ignore repeats.
    pub fn attach_visibility(&mut self, monitor: &VisibilityMonitor) {
        let tx = self.signal_tx.clone();
        let subscription = monitor.subscribe(move |visibility| {
            // Closed after teardown.
            let _ = tx.send(Signal::Visibility(*visibility));
        });
        self.subscriptions.push(subscription);

        let _ = self.signal_tx.send(Signal::Visibility(monitor.current()));
    }

    /// Follow playback signals from `source`.
    pub fn attach_video(&mut self, source: &dyn VideoSource) {
        let tx = self.signal_tx.clone();
        let subscription = source.subscribe(Box::new(move |signal: &PlaybackSignal| {
            let _ = tx.send(Signal::Playback(*signal));
        }));
        self.subscriptions.push(subscription);
    }

    pub async fn run(mut self, cancellation: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            strategy = %self.engine.strategy(),
            threshold_secs = self.engine.snapshot().threshold_secs,
            "Gate session started"
        );

        loop {
            let unlocked = self.engine.snapshot().unlocked();
            tokio::select! {
                _ = cancellation.cancelled() => {
                    break;
                }
                Some(signal) = self.signal_rx.recv() => {
                    self.handle_signal(signal);
                }
                _ = interval.tick(), if !unlocked => {
                    if self.engine.sample() {
                        self.publish();
                    }
                }
            }
        }

        self.subscriptions.clear();
        debug!("Gate session torn down");
    }

    fn handle_signal(&mut self, signal: Signal) {
        if let Signal::Playback(playback) = signal {
            match playback {
                PlaybackSignal::Started => self.report(events::VIDEO_PLAY),
                PlaybackSignal::Stopped => self.report(events::VIDEO_PAUSE),
                PlaybackSignal::Progress(quartile) => {
                    self.report(&events::video_progress(quartile.percent()))
                }
            }
        }

        if self.engine.apply(signal) {
            self.publish();
        } else {
            trace!(?signal, "Signal left engine unchanged");
        }
    }

    fn publish(&mut self) {
        let snapshot = self.engine.snapshot();

        if snapshot.unlocked() && !self.unlock_reported {
            self.unlock_reported = true;
            info!(elapsed_secs = snapshot.elapsed_secs, "Gate unlocked");
            self.report(events::GATE_UNLOCKED);
        }

        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    fn report(&self, event: &str) {
        report_quietly(self.reporter.as_ref(), event);
    }
}

/// Read side of a session. Cheap to clone; stays valid after the session
/// ends, holding the final snapshot.
#[derive(Debug, Clone)]
pub struct GateHandle {
    rx: watch::Receiver<EngagementSnapshot>,
}

impl GateHandle {
    pub fn snapshot(&self) -> EngagementSnapshot {
        *self.rx.borrow()
    }

    pub fn is_unlocked(&self) -> bool {
        self.rx.borrow().unlocked()
    }

    pub fn view(&self) -> GateView {
        GateView::from_snapshot(&self.rx.borrow())
    }

    /// A receiver for change notification.
    pub fn watch(&self) -> watch::Receiver<EngagementSnapshot> {
        self.rx.clone()
    }

    /// Resolve once the gate is unlocked. Returns `None` if the session
    /// ended first.
    pub async fn wait_unlocked(&self) -> Option<EngagementSnapshot> {
        let mut rx = self.rx.clone();
        rx.wait_for(EngagementSnapshot::unlocked)
            .await
            .map(|snapshot| *snapshot)
            .ok()
    }
}
