//! # Node Forecast Core Library
//!
//! This library holds the two forecasting engines used for the solar-powered sensor
//! deployment: a battery lifetime model for the gateway ("T0") and its two satellite
//! nodes, and a harmonic tide model that predicts tide heights and harvest windows.
//!
//! ## Design Philosophy
//!
//! ### Pure computation
//! - **No I/O in the core**: telemetry records and configuration arrive as plain values
//!   from whatever downloads and merges the data feed
//! - **Total functions**: malformed configuration, short series and degenerate fits all
//!   resolve to `None`, an empty `Vec` or a structured "insufficient" value
//! - **Explicit state**: the only thing carried between recomputations is the per-node
//!   [`forecast::NodeForecastState`], which the caller owns and threads through
//!
//! ### Data Flow
//! 1. **Energy**: raw config string → [`device_config::DeviceConfig`] →
//!    [`energy::EnergyBudget`] → [`projection::project`] → [`trend::estimate_trend`] →
//!    [`projection::evaluate_accuracy`]
//! 2. **Tide**: [`harmonics::height_at`] → [`tide_curve::sample_curve`] →
//!    [`tide_curve::find_extrema`] → [`lunar`] moon events → [`harvest`] windows
//!
//! ## Core Types
//!
//! - [`Reading`]: one measured battery percentage at an instant
//! - [`ProjectionPoint`]: one point of a projected discharge curve

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod device_config;
pub mod energy;
pub mod error;
pub mod forecast;
pub mod hardware;
pub mod harmonics;
pub mod harvest;
pub mod lunar;
pub mod projection;
pub mod telemetry;
pub mod tide_curve;
pub mod trend;

#[cfg(test)]
mod tests;

pub use error::ForecastError;

/// Milliseconds in one day, the unit the discharge curves are laid out in.
pub const MS_PER_DAY: f64 = 86_400_000.0;

/// A measured battery level for one node.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use node_forecast_lib::Reading;
///
/// let reading = Reading {
///     time: Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap(),
///     percent: 87.5,
/// };
/// assert!(reading.percent > 80.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub time: DateTime<Utc>,
    /// State of charge, 0–100
    pub percent: f64,
}

/// A single point on a projected (or fitted) discharge curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    pub time: DateTime<Utc>,
    /// Remaining charge in percent, clamped to 0–100
    pub percent_remaining: f64,
}

/// Milliseconds between two instants as a float, negative when `to` precedes `from`.
pub(crate) fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64
}

/// `origin` shifted by a fractional number of milliseconds.
pub(crate) fn offset_ms(origin: DateTime<Utc>, ms: f64) -> DateTime<Utc> {
    origin + chrono::Duration::milliseconds(ms.round() as i64)
}
