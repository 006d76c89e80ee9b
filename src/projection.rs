//! # Discharge Curve Projection
//!
//! Projects a battery's charge forward one day at a time from an anchor reading,
//! assuming the configuration's daily draw holds, and scores an earlier projection
//! against the readings that arrived after it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{elapsed_ms, ProjectionPoint, Reading};

/// Hard cap on the projection horizon, in days.
pub const MAX_PROJECTION_DAYS: u32 = 730;

/// Inputs for one projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionParams {
    pub anchor_percent: f64,
    pub anchor_time: DateTime<Utc>,
    pub daily_consumption_mah: f64,
    pub battery_capacity_mah: f64,
    pub derating: f64,
    /// Number of daily points to emit; defaults to reaching empty plus one
    pub max_days: Option<u32>,
}

impl ProjectionParams {
    fn usable_mah(&self) -> f64 {
        self.battery_capacity_mah * self.derating
    }

    fn remaining_mah(&self) -> f64 {
        self.anchor_percent / 100.0 * self.usable_mah()
    }

    fn horizon_days(&self) -> u32 {
        let default = (self.remaining_mah() / self.daily_consumption_mah).ceil() + 1.0;
        let days = match self.max_days {
            Some(days) => days,
            None if default.is_finite() && default > 0.0 => {
                default.min(f64::from(MAX_PROJECTION_DAYS)) as u32
            }
            None => 0,
        };
        days.min(MAX_PROJECTION_DAYS)
    }
}

/// Lazy daily projection. Cloning restarts it from the anchor.
#[derive(Clone, Debug)]
pub struct Projection {
    params: ProjectionParams,
    day: u32,
    horizon: u32,
    done: bool,
}

impl Iterator for Projection {
    type Item = ProjectionPoint;

    fn next(&mut self) -> Option<ProjectionPoint> {
        if self.done || self.day >= self.horizon {
            return None;
        }
        let p = &self.params;
        let day = f64::from(self.day);
        let percent = ((p.remaining_mah() - day * p.daily_consumption_mah) / p.usable_mah()
            * 100.0)
            .clamp(0.0, 100.0);
        let point = ProjectionPoint {
            time: p.anchor_time + Duration::days(i64::from(self.day)),
            percent_remaining: percent,
        };
        self.day += 1;
        if percent <= 0.0 {
            self.done = true;
        }
        Some(point)
    }
}

/// Project remaining charge day by day from the anchor until empty or the horizon.
///
/// A non-positive daily draw or a battery without usable capacity gives an empty
/// projection.
pub fn project(params: ProjectionParams) -> Projection {
    let usable = params.usable_mah();
    let degenerate = !(params.daily_consumption_mah > 0.0) || !(usable > 0.0);
    let horizon = if degenerate { 0 } else { params.horizon_days() };
    Projection {
        params,
        day: 0,
        horizon,
        done: false,
    }
}

/// Linear interpolation of a curve at `time`; `None` outside the curve's span.
pub fn interpolate(curve: &[ProjectionPoint], time: DateTime<Utc>) -> Option<f64> {
    let first = curve.first()?;
    let last = curve.last()?;
    if time < first.time || time > last.time {
        return None;
    }
    if let Some(exact) = curve.iter().find(|p| p.time == time) {
        return Some(exact.percent_remaining);
    }
    let (p0, p1) = curve
        .windows(2)
        .find(|w| w[0].time <= time && time <= w[1].time)
        .map(|w| (&w[0], &w[1]))?;

    let span = elapsed_ms(p0.time, p1.time);
    if span <= 0.0 {
        return Some(p0.percent_remaining);
    }
    let alpha = elapsed_ms(p0.time, time) / span;
    Some(p0.percent_remaining + alpha * (p1.percent_remaining - p0.percent_remaining))
}

/// How closely a projection matched what the battery actually did.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Accuracy {
    pub mean_absolute_error: f64,
    pub sample_count: usize,
}

/// Mean absolute error of readings taken after `anchor_time` against `curve`.
///
/// Readings outside the projected span are skipped. `None` when the curve has fewer
/// than two points or no reading can be compared.
pub fn evaluate_accuracy(
    actual: &[Reading],
    anchor_time: DateTime<Utc>,
    curve: &[ProjectionPoint],
) -> Option<Accuracy> {
    if curve.len() < 2 {
        return None;
    }
    let (sum, count) = actual
        .iter()
        .filter(|r| r.time > anchor_time)
        .filter_map(|r| interpolate(curve, r.time).map(|p| (r.percent - p).abs()))
        .fold((0.0, 0usize), |(sum, n), err| (sum + err, n + 1));

    if count == 0 {
        return None;
    }
    Some(Accuracy {
        mean_absolute_error: sum / count as f64,
        sample_count: count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()
    }

    fn params(daily: f64) -> ProjectionParams {
        ProjectionParams {
            anchor_percent: 80.0,
            anchor_time: t0(),
            daily_consumption_mah: daily,
            battery_capacity_mah: 3000.0,
            derating: 0.85,
            max_days: None,
        }
    }

    #[test]
    fn test_projection_reference_shape() {
        let points: Vec<_> = project(params(30.0)).collect();
        assert_eq!(points[0].time, t0());
        assert!((points[0].percent_remaining - 80.0).abs() < 1e-9);
        for pair in points.windows(2) {
            assert!(pair[1].percent_remaining <= pair[0].percent_remaining);
            assert_eq!(pair[1].time - pair[0].time, Duration::days(1));
        }
        assert_eq!(points.last().unwrap().percent_remaining, 0.0);
        assert!(points.len() <= MAX_PROJECTION_DAYS as usize);
        // 2040 mAh at 30 mAh/day empties on day 68
        assert!((69..=70).contains(&points.len()));
    }

    #[test]
    fn test_projection_stops_at_first_zero() {
        let points: Vec<_> = project(ProjectionParams {
            max_days: Some(500),
            ..params(100.0)
        })
        .collect();
        let zeros = points.iter().filter(|p| p.percent_remaining == 0.0).count();
        assert_eq!(zeros, 1);
        assert!(points.len() < 500);
    }

    #[test]
    fn test_projection_is_capped() {
        let points: Vec<_> = project(params(0.01)).collect();
        assert_eq!(points.len(), MAX_PROJECTION_DAYS as usize);
        let points: Vec<_> = project(ProjectionParams {
            max_days: Some(5000),
            ..params(0.01)
        })
        .collect();
        assert_eq!(points.len(), MAX_PROJECTION_DAYS as usize);
    }

    #[test]
    fn test_projection_degenerate_inputs_are_empty() {
        assert_eq!(project(params(0.0)).count(), 0);
        assert_eq!(project(params(-3.0)).count(), 0);
        assert_eq!(
            project(ProjectionParams {
                battery_capacity_mah: 0.0,
                ..params(30.0)
            })
            .count(),
            0
        );
    }

    #[test]
    fn test_projection_is_restartable() {
        let projection = project(params(30.0));
        let first: Vec<_> = projection.clone().collect();
        let second: Vec<_> = projection.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_interpolate_between_days() {
        let curve: Vec<_> = project(params(30.0)).collect();
        let mid = t0() + Duration::hours(12);
        let value = interpolate(&curve, mid).unwrap();
        let expected = (curve[0].percent_remaining + curve[1].percent_remaining) / 2.0;
        assert!((value - expected).abs() < 1e-9);
        assert!(interpolate(&curve, t0() - Duration::hours(1)).is_none());
        assert!(interpolate(&[], t0()).is_none());
    }

    #[test]
    fn test_accuracy_mean_absolute_error() {
        let curve: Vec<_> = project(params(30.0)).collect();
        let actual = vec![
            // at the anchor: excluded
            Reading { time: t0(), percent: 10.0 },
            Reading {
                time: t0() + Duration::days(1),
                percent: curve[1].percent_remaining + 2.0,
            },
            Reading {
                time: t0() + Duration::days(2),
                percent: curve[2].percent_remaining - 4.0,
            },
            // beyond the curve: skipped
            Reading {
                time: t0() + Duration::days(1000),
                percent: 0.0,
            },
        ];
        let accuracy = evaluate_accuracy(&actual, t0(), &curve).unwrap();
        assert_eq!(accuracy.sample_count, 2);
        assert!((accuracy.mean_absolute_error - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_accuracy_undefined_cases() {
        let curve: Vec<_> = project(params(30.0)).collect();
        assert!(evaluate_accuracy(&[], t0(), &curve).is_none());
        let reading = [Reading {
            time: t0() + Duration::days(1),
            percent: 70.0,
        }];
        assert!(evaluate_accuracy(&reading, t0(), &curve[..1]).is_none());
    }
}
