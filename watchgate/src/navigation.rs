//! Routes "continue" intents to the video or to the booking widget.

use std::sync::Arc;

use crate::reporting::{ReportSink, events, report_quietly};
use crate::session::GateHandle;
use crate::tracing::prelude::*;

/// A place on the page that can receive focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Target {
    /// The video the visitor has to watch.
    Engagement,
    /// The booking widget.
    Booking,
}

impl Target {
    /// Anchor id the host mounts the target under.
    pub fn anchor(self) -> &'static str {
        match self {
            Target::Engagement => "vsl",
            Target::Booking => "book",
        }
    }
}

/// Something that can move focus on the page.
pub trait Navigator: Send + Sync {
    fn focus(&self, target: Target);
}

/// Buttons that ask to continue to booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ContinueAction {
    /// Sticky header button.
    HeaderButton,
    /// Button below the video.
    PrimaryCta,
}

pub struct NavigationCoordinator {
    gate: GateHandle,
    navigator: Arc<dyn Navigator>,
    reporter: Arc<dyn ReportSink>,
}

impl NavigationCoordinator {
    pub fn new(
        gate: GateHandle,
        navigator: Arc<dyn Navigator>,
        reporter: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            gate,
            navigator,
            reporter,
        }
    }

    /// Focus the booking widget if the gate is open, otherwise send the
    /// visitor back to the video and record which button they pressed.
    ///
    /// Only reads gate state.
    pub fn request_continue(&self, action: ContinueAction) -> Target {
        let target = if self.gate.is_unlocked() {
            Target::Booking
        } else {
            report_quietly(self.reporter.as_ref(), &events::locked_action(action));
            Target::Engagement
        };

        debug!(%action, %target, "Continue requested");
        self.navigator.focus(target);
        target
    }

    /// "Go back to video" on the locked booking overlay.
    pub fn return_to_video(&self) -> Target {
        self.navigator.focus(Target::Engagement);
        Target::Engagement
    }
}

/// Logs focus requests. For hosts without a page to scroll.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn focus(&self, target: Target) {
        info!(%target, anchor = target.anchor(), "Focus");
    }
}
