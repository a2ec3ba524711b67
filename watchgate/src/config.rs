//! Gate configuration.
//!
//! A deployment picks a threshold and an engine strategy once, at page
//! mount. Values come from [`GateConfig::default`], optionally overlaid
//! by a JSON document and then by `WATCHGATE_*` environment variables.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How attention time is measured.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum EngineStrategy {
    /// Wall-clock time since mount. Keeps counting while the page is
    /// hidden and needs no playback signal.
    Countdown,

    /// Foreground play time reported by the video player. Pauses,
    /// hiding the page and playback ending all halt accumulation.
    #[default]
    WatchTime,
}

pub const ENV_THRESHOLD_SECS: &str = "WATCHGATE_THRESHOLD_SECS";
pub const ENV_ENGINE: &str = "WATCHGATE_ENGINE";
pub const ENV_TICK_MS: &str = "WATCHGATE_TICK_MS";
pub const ENV_MAX_SAMPLE_DELTA_SECS: &str = "WATCHGATE_MAX_SAMPLE_DELTA_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Attention time required before the gate opens (seconds). Fixed
    /// for the lifetime of a session; deployments use 75 to 600.
    pub required_threshold_secs: f64,

    /// Which engine measures attention time.
    pub engine: EngineStrategy,

    /// Sample period of the tick scheduler (milliseconds).
    pub tick_interval_ms: u64,

    /// Largest contribution a single watch-time sample may make
    /// (seconds). Bounds the damage of a scheduler stall or clock jump.
    pub max_sample_delta_secs: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            required_threshold_secs: 120.0,
            engine: EngineStrategy::WatchTime,
            tick_interval_ms: 250,
            max_sample_delta_secs: 2.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required threshold must be a positive number of seconds, got {0}")]
    InvalidThreshold(f64),

    #[error("tick interval must be greater than zero")]
    ZeroTickInterval,

    #[error("max sample delta must be a positive number of seconds, got {0}")]
    InvalidMaxSampleDelta(f64),

    #[error("unknown engine strategy {0:?} (expected \"countdown\" or \"watch-time\")")]
    UnknownEngine(String),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl GateConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `WATCHGATE_*` overrides looked up through `lookup`, then
    /// validate.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_THRESHOLD_SECS) {
            self.required_threshold_secs = parse_value(ENV_THRESHOLD_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_ENGINE) {
            self.engine = EngineStrategy::from_str(value.trim())
                .map_err(|_| ConfigError::UnknownEngine(value))?;
        }
        if let Some(value) = lookup(ENV_TICK_MS) {
            self.tick_interval_ms = parse_value(ENV_TICK_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_SAMPLE_DELTA_SECS) {
            self.max_sample_delta_secs = parse_value(ENV_MAX_SAMPLE_DELTA_SECS, &value)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Load from an optional JSON file, then apply the environment.
    pub fn load(path: Option<&Path>) -> crate::error::Result<Self> {
        let base = match path {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&json)?
            }
            None => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok())?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.required_threshold_secs.is_finite() || self.required_threshold_secs <= 0.0 {
            return Err(ConfigError::InvalidThreshold(self.required_threshold_secs));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        if !self.max_sample_delta_secs.is_finite() || self.max_sample_delta_secs <= 0.0 {
            return Err(ConfigError::InvalidMaxSampleDelta(
                self.max_sample_delta_secs,
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
