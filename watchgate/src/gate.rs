//! Unlock gate: the derived boolean and what the page shows for it.
//!
//! Nothing here holds state. The gate is recomputed from an
//! [`EngagementSnapshot`] on every read.

use serde::Serialize;

use crate::engine::EngagementSnapshot;

/// `true` once engaged time has reached the threshold.
pub fn is_unlocked(elapsed_secs: f64, threshold_secs: f64) -> bool {
    elapsed_secs >= threshold_secs
}

/// Render remaining seconds as `m:ss`.
///
/// The value is rounded up to whole seconds and clamped at zero, so the
/// display never shows a fraction or a negative time. Minutes are not
/// padded and may exceed 59.
pub fn format_remaining(remaining_secs: f64) -> String {
    let whole = if remaining_secs.is_finite() {
        remaining_secs.ceil().max(0.0) as u64
    } else {
        0
    };
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Everything the page renders from the gate state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateView {
    pub unlocked: bool,
    /// Remaining time as `m:ss`.
    pub remaining: String,
    /// Sticky header button.
    pub header_label: String,
    /// Tooltip on the header button.
    pub header_title: String,
    /// Button below the video.
    pub cta_label: String,
    /// Small print below the call-to-action.
    pub hint: String,
    /// Text over the booking widget while it is locked.
    pub overlay: Option<String>,
    /// Whether the booking widget accepts pointer input.
    pub booking_interactive: bool,
}

impl GateView {
    pub fn from_snapshot(snapshot: &EngagementSnapshot) -> Self {
        let remaining = format_remaining(snapshot.remaining_secs());

        if snapshot.unlocked() {
            Self {
                unlocked: true,
                remaining,
                header_label: "Book now".into(),
                header_title: "Book now".into(),
                cta_label: "Book your bonus call".into(),
                hint: "You're unlocked—grab a time below.".into(),
                overlay: None,
                booking_interactive: true,
            }
        } else {
            Self {
                unlocked: false,
                header_label: format!("Unlock in {remaining}"),
                header_title: format!("Unlocks after {remaining} of watch time"),
                cta_label: "Keep watching to unlock".into(),
                hint: "We only unlock the booking after you catch the key setup steps.".into(),
                overlay: Some(format!(
                    "Booking unlocks after {remaining} more watch time."
                )),
                booking_interactive: false,
                remaining,
            }
        }
    }
}

impl From<&EngagementSnapshot> for GateView {
    fn from(snapshot: &EngagementSnapshot) -> Self {
        Self::from_snapshot(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::config::EngineStrategy;
    use crate::engine::Phase;

    #[test_case(0.0, "0:00"; "zero")]
    #[test_case(75.0, "1:15"; "minute and change")]
    #[test_case(-5.0, "0:00"; "negative clamps")]
    #[test_case(0.2, "0:01"; "fraction rounds up")]
    #[test_case(59.01, "1:00"; "rounds into next minute")]
    #[test_case(600.0, "10:00"; "ten minutes")]
    #[test_case(3725.0, "62:05"; "minutes are not wrapped")]
    #[test_case(f64::NAN, "0:00"; "nan")]
    #[test_case(f64::NEG_INFINITY, "0:00"; "negative infinity")]
    fn formats_remaining(secs: f64, expected: &str) {
        assert_eq!(format_remaining(secs), expected);
    }

    #[test_case(74.0, 75.0, false)]
    #[test_case(75.0, 75.0, true)]
    #[test_case(75.5, 75.0, true)]
    fn unlock_condition(elapsed: f64, threshold: f64, expected: bool) {
        assert_eq!(is_unlocked(elapsed, threshold), expected);
    }

    fn snapshot(elapsed_secs: f64, threshold_secs: f64) -> EngagementSnapshot {
        EngagementSnapshot {
            strategy: EngineStrategy::WatchTime,
            phase: Phase::Idle,
            elapsed_secs,
            threshold_secs,
            is_playing: false,
            is_foreground: true,
        }
    }

    #[test]
    fn locked_view_shows_remaining_time() {
        let view = GateView::from_snapshot(&snapshot(44.5, 120.0));

        assert!(!view.unlocked);
        assert_eq!(view.remaining, "1:16");
        assert_eq!(view.header_label, "Unlock in 1:16");
        assert_eq!(view.header_title, "Unlocks after 1:16 of watch time");
        assert_eq!(
            view.overlay.as_deref(),
            Some("Booking unlocks after 1:16 more watch time.")
        );
        assert!(!view.booking_interactive);
    }

    #[test]
    fn unlocked_view_enables_booking() {
        let view = GateView::from(&snapshot(120.0, 120.0));

        assert!(view.unlocked);
        assert_eq!(view.remaining, "0:00");
        assert_eq!(view.header_label, "Book now");
        assert_eq!(view.cta_label, "Book your bonus call");
        assert_eq!(view.hint, "You're unlocked—grab a time below.");
        assert!(view.overlay.is_none());
        assert!(view.booking_interactive);
    }
}
