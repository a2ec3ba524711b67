//! Fire-and-forget reporting.
//!
//! Analytics delivery is somebody else's problem. The core hands event
//! names to a [`ReportSink`] and moves on: no acknowledgement, no retry,
//! no ordering. A failing sink must never influence gating, so callers go
//! through [`report_quietly`], which logs and discards errors.

use tokio::sync::mpsc;

use crate::tracing::prelude::*;

/// Event names emitted by the core.
pub mod events {
    pub const VIDEO_PLAY: &str = "video_play";
    pub const VIDEO_PAUSE: &str = "video_pause";
    pub const GATE_UNLOCKED: &str = "gate_unlocked";

    /// `video_progress_<percent>`.
    pub fn video_progress(percent: u8) -> String {
        format!("video_progress_{percent}")
    }

    /// `locked_<action>`: a locked call-to-action was pressed.
    pub fn locked_action(action: impl std::fmt::Display) -> String {
        format!("locked_{action}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("reporting channel closed")]
    Closed,

    #[error("reporting channel full")]
    Full,

    #[error("sink rejected event: {0}")]
    Rejected(String),
}

pub trait ReportSink: Send + Sync {
    fn report(&self, event: &str) -> Result<(), ReportError>;
}

/// Report `event`, discarding any failure.
pub fn report_quietly(sink: &dyn ReportSink, event: &str) {
    if let Err(e) = sink.report(event) {
        debug!(event, error = %e, "Report dropped");
    }
}

/// Writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&self, event: &str) -> Result<(), ReportError> {
        info!(event, "Report");
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn report(&self, _event: &str) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Forwards events to a bounded channel. Never waits: when the consumer
/// falls behind, events are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

impl ReportSink for ChannelSink {
    fn report(&self, event: &str) -> Result<(), ReportError> {
        self.tx.try_send(event.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ReportError::Full,
            mpsc::error::TrySendError::Closed(_) => ReportError::Closed,
        })
    }
}
