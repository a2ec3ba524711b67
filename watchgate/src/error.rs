//! Crate-level error type.
//!
//! Nothing in the gating path returns an error: clock anomalies are
//! clamped, silent players simply never unlock the gate, and reporting
//! failures are swallowed. What remains is configuration and parsing.

use std::path::PathBuf;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
