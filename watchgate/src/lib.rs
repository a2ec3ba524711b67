//! Engagement-gated unlock timer.
//!
//! A booking call-to-action stays locked until the visitor has spent
//! enough attention time on a piece of video content. The crate measures
//! that time with one of two interchangeable engines, reconciles it
//! against playback and page-visibility signals, and exposes the
//! resulting gate state to whatever renders the page.
//!
//! The moving parts, leaves first:
//!
//! - [`clock`]: timestamp sources (monotonic, wall clock, manual).
//! - [`visibility`]: foreground/background edge notifications.
//! - [`playback`]: normalizes player events into `Started`/`Stopped`.
//! - [`accumulator`] and [`countdown`]: the two engine strategies, unified
//!   behind [`engine::Engine`].
//! - [`gate`]: the derived unlock condition and its UI copy.
//! - [`session`]: the task that owns an engine and publishes snapshots.
//! - [`navigation`]: routes "continue" intents based on gate state.
//! - [`reporting`]: fire-and-forget analytics sinks.
//! - [`poster`]: picks the poster image from the video host's metadata.

pub mod accumulator;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod engine;
pub mod error;
pub mod gate;
pub mod navigation;
pub mod playback;
pub mod poster;
pub mod reporting;
pub mod session;
pub mod tracing;
pub mod types;
pub mod visibility;
