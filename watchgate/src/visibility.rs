//! Page visibility monitor.
//!
//! The host reports foreground/background through
//! [`VisibilityMonitor::set`]. Subscribers hear about edges only: reporting
//! the state the monitor already holds is silent.
//!
//! Tick suspension alone is not a reliable signal that the page went
//! away (hosts throttle rather than stop, and not promptly), so the
//! accumulator listens here as well and drops its baseline the moment a
//! background edge arrives.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde::Serialize;

use crate::tracing::prelude::*;
use crate::types::{Observers, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Visibility {
    Foreground,
    Background,
}

impl Visibility {
    pub fn is_foreground(self) -> bool {
        self == Visibility::Foreground
    }

    pub fn from_hidden(hidden: bool) -> Self {
        if hidden {
            Visibility::Background
        } else {
            Visibility::Foreground
        }
    }
}

/// Foreground/background state with edge-triggered notification.
///
/// Clones share state and subscribers, so one monitor can be handed to
/// the host integration and to every session that needs it.
#[derive(Debug, Clone)]
pub struct VisibilityMonitor {
    current: Arc<Mutex<Visibility>>,
    observers: Observers<Visibility>,
}

impl VisibilityMonitor {
    /// A page is visible at first paint.
    pub fn new() -> Self {
        Self::with_initial(Visibility::Foreground)
    }

    pub fn with_initial(initial: Visibility) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
            observers: Observers::new(),
        }
    }

    /// The process-wide monitor.
    pub fn global() -> &'static VisibilityMonitor {
        static GLOBAL: OnceLock<VisibilityMonitor> = OnceLock::new();
        GLOBAL.get_or_init(VisibilityMonitor::new)
    }

    pub fn current(&self) -> Visibility {
        *self.current.lock()
    }

    pub fn is_foreground(&self) -> bool {
        self.current().is_foreground()
    }

    /// Record the page's visibility. Returns `true` and notifies
    /// subscribers only if this is a transition.
    pub fn set(&self, visibility: Visibility) -> bool {
        {
            let mut current = self.current.lock();
            if *current == visibility {
                trace!(visibility = %visibility, "Visibility unchanged");
                return false;
            }
            *current = visibility;
        }

        debug!(visibility = %visibility, "Visibility changed");
        self.observers.notify(&visibility);
        true
    }

    /// Call `callback` on every subsequent transition.
    pub fn subscribe(
        &self,
        callback: impl Fn(&Visibility) + Send + Sync + 'static,
    ) -> Subscription {
        self.observers.subscribe(callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }
}

impl Default for VisibilityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
