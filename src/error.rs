//! # Error Types
//!
//! Only contract violations and outer-shell I/O are errors here. Missing telemetry,
//! unusable configuration strings and degenerate fits are ordinary return values
//! (`None`, empty curves, [`crate::trend::TrendOutcome::Insufficient`]).

use std::io;
use thiserror::Error;

/// Errors that stop a computation.
#[derive(Error, Debug)]
pub enum ForecastError {
    /// A tide location key that is neither a preset nor configured
    #[error(
        "unknown tide location: {0} (presets: {})",
        crate::harmonics::PRESET_KEYS.join(", ")
    )]
    UnknownLocation(String),

    /// Configuration file could not be parsed
    #[error("config parse: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration could not be written
    #[error("config write: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Telemetry export could not be decoded
    #[error("telemetry decode: {0}")]
    Telemetry(#[from] serde_json::Error),

    /// File system problems while reading or writing inputs
    #[error("IO: {0}")]
    Io(#[from] io::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ForecastError>;
