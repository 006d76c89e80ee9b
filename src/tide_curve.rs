//! # Tide Curves and Extrema
//!
//! Samples the harmonic model on a regular grid and picks out the high and low waters.
//! The grid spacing bounds how precisely an extremum's time is known: a 10-minute grid
//! places each high or low within ±5 minutes, which is plenty for charts and harvest
//! planning.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::harmonics::{height_at, HarmonicLocation};

/// Predicted height at an instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TidePoint {
    pub time: DateTime<Utc>,
    pub height_m: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtremumKind {
    High,
    Low,
}

/// A local high or low water.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TideExtremum {
    pub time: DateTime<Utc>,
    pub height_m: f64,
    pub kind: ExtremumKind,
}

/// Lazy curve over `[start, end]`. Cloning restarts it.
#[derive(Clone, Debug)]
pub struct TideCurve<'a> {
    location: &'a HarmonicLocation,
    next: Option<DateTime<Utc>>,
    end: DateTime<Utc>,
    step: Duration,
}

impl Iterator for TideCurve<'_> {
    type Item = TidePoint;

    fn next(&mut self) -> Option<TidePoint> {
        let time = self.next?;
        self.next = if time >= self.end {
            None
        } else {
            // Land exactly on `end` even when it is off the grid
            Some((time + self.step).min(self.end))
        };
        Some(TidePoint {
            time,
            height_m: height_at(time, self.location),
        })
    }
}

/// Heights every `interval_minutes` from `start`, finishing exactly at `end`.
///
/// Empty when the interval is not positive or `end` precedes `start`.
pub fn sample_curve(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    location: &HarmonicLocation,
    interval_minutes: i64,
) -> TideCurve<'_> {
    let next = (interval_minutes > 0 && start <= end).then_some(start);
    TideCurve {
        location,
        next,
        end,
        step: Duration::minutes(interval_minutes.max(1)),
    }
}

/// Strict local maxima and minima of a sampled curve.
///
/// Plateaus (equal neighbours) are skipped; the first and last points can never
/// qualify.
pub fn find_extrema(curve: &[TidePoint]) -> Vec<TideExtremum> {
    if curve.len() < 3 {
        return Vec::new();
    }
    curve
        .windows(3)
        .filter_map(|w| {
            let (prev, point, next) = (&w[0], &w[1], &w[2]);
            let kind = if point.height_m > prev.height_m && point.height_m > next.height_m {
                ExtremumKind::High
            } else if point.height_m < prev.height_m && point.height_m < next.height_m {
                ExtremumKind::Low
            } else {
                return None;
            };
            Some(TideExtremum {
                time: point.time,
                height_m: point.height_m,
                kind,
            })
        })
        .collect()
}
