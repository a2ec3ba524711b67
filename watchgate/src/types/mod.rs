//! Small shared building blocks.

pub mod observers;

pub use observers::{Observers, Subscription};
