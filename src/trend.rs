//! # Discharge Trend Estimation
//!
//! Fits a straight line to the most recent unbroken stretch of discharge readings and
//! extends it forward, as a data-driven counterpart to the configuration-based
//! projection in [`crate::projection`].
//!
//! ## Pipeline
//! 1. **Streak**: walk back from the newest reading until a gap over 3 hours or a rise
//!    of more than 3 points (the panel recharged the battery)
//! 2. **Window**: pick the largest rung of [`WINDOW_LADDER`] that fits in the streak and
//!    has enough readings in its trailing slice
//! 3. **Fit**: least squares of percent against milliseconds since the window start
//! 4. **Extend**: 80 points from the window start to `min(1.05 × time-to-empty, 90 days)`
//!    past the newest reading
//!
//! Solar nodes spend most days charging, so "not enough discharge yet" is the common
//! answer and is returned as a [`TrendShortfall`] the UI can show directly.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{elapsed_ms, offset_ms, ProjectionPoint, Reading, MS_PER_DAY};

/// A reading more than this long after the previous one starts a new streak.
pub const MAX_STREAK_GAP_HOURS: i64 = 3;
/// A rise larger than this is treated as a recharge and starts a new streak.
pub const RECHARGE_RISE_PERCENT: f64 = 3.0;
/// Points in the extended trend line.
pub const TREND_POINTS: usize = 80;
/// Furthest the trend line is extended past the newest reading.
pub const MAX_TREND_EXTENSION_DAYS: i64 = 90;
const TIME_TO_EMPTY_MARGIN: f64 = 1.05;

/// One rung of the fitting-window ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrendWindow {
    pub span_hours: i64,
    pub min_points: usize,
    pub label: &'static str,
}

impl TrendWindow {
    pub fn span(&self) -> Duration {
        Duration::hours(self.span_hours)
    }
}

/// Smallest to largest.
pub static WINDOW_LADDER: [TrendWindow; 6] = [
    TrendWindow {
        span_hours: 48,
        min_points: 4,
        label: "48 h",
    },
    TrendWindow {
        span_hours: 96,
        min_points: 6,
        label: "4 d",
    },
    TrendWindow {
        span_hours: 7 * 24,
        min_points: 10,
        label: "1 wk",
    },
    TrendWindow {
        span_hours: 14 * 24,
        min_points: 16,
        label: "2 wk",
    },
    TrendWindow {
        span_hours: 28 * 24,
        min_points: 24,
        label: "4 wk",
    },
    TrendWindow {
        span_hours: 56 * 24,
        min_points: 40,
        label: "8 wk",
    },
];

/// Result of an ordinary least-squares fit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    /// Change in y per unit x
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Least-squares line through `(x, y)` pairs.
///
/// `None` for fewer than two points or when all x values coincide.
pub fn lin_reg(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let (sum_x, sum_y, sum_xy, sum_xx) = points.iter().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sx, sy, sxy, sxx), &(x, y)| (sx + x, sy + y, sxy + x * y, sxx + x * x),
    );

    let denominator = n.mul_add(sum_xx, -(sum_x * sum_x));
    if denominator.abs() <= f64::EPSILON * n * sum_xx.abs().max(1.0) {
        return None;
    }
    let slope = n.mul_add(sum_xy, -(sum_x * sum_y)) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;

    let mean_y = sum_y / n;
    let (ss_res, ss_tot) = points.iter().fold((0.0, 0.0), |(res, tot), &(x, y)| {
        let fitted = intercept + slope * x;
        (res + (y - fitted).powi(2), tot + (y - mean_y).powi(2))
    });
    let r_squared = if ss_tot < 1e-12 {
        0.0
    } else {
        (1.0 - ss_res / ss_tot).max(0.0)
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

/// The newest run of readings with no long gap and no recharge.
pub fn discharge_streak(readings: &[Reading]) -> &[Reading] {
    if readings.is_empty() {
        return readings;
    }
    let max_gap = Duration::hours(MAX_STREAK_GAP_HOURS);
    let mut start = readings.len() - 1;
    while start > 0 {
        let newer = &readings[start];
        let older = &readings[start - 1];
        let gap = newer.time - older.time > max_gap;
        let recharge = newer.percent - older.percent > RECHARGE_RISE_PERCENT;
        if gap || recharge {
            break;
        }
        start -= 1;
    }
    &readings[start..]
}

/// Why no trend line could be drawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShortfallReason {
    NoReadings,
    /// Still building up toward the smallest window
    Collecting {
        streak_hours: f64,
        required_hours: f64,
        points: usize,
        required_points: usize,
    },
    /// Enough data, but the battery is not going down (or the fit is degenerate)
    NoDischargeSlope { window_label: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendShortfall {
    pub reason: ShortfallReason,
    pub message: String,
}

impl TrendShortfall {
    fn new(reason: ShortfallReason) -> Self {
        let message = match &reason {
            ShortfallReason::NoReadings => "No readings yet".to_string(),
            ShortfallReason::Collecting {
                streak_hours,
                required_hours,
                points,
                required_points,
            } => format!(
                "Collecting discharge data: {:.0} of {:.0} h, {} of {} readings",
                streak_hours.min(*required_hours),
                required_hours,
                points,
                required_points
            ),
            ShortfallReason::NoDischargeSlope { window_label } => {
                format!("No discharge slope yet ({window_label} window)")
            }
        };
        TrendShortfall { reason, message }
    }
}

/// A fitted trend line ready to plot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendFit {
    pub points: Vec<ProjectionPoint>,
    pub window_label: String,
    pub r_squared: f64,
    pub slope_percent_per_day: f64,
    pub point_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendOutcome {
    Fitted(TrendFit),
    Insufficient(TrendShortfall),
}

impl TrendOutcome {
    pub fn fit(&self) -> Option<&TrendFit> {
        match self {
            TrendOutcome::Fitted(fit) => Some(fit),
            TrendOutcome::Insufficient(_) => None,
        }
    }

    fn shortfall(reason: ShortfallReason) -> Self {
        let shortfall = TrendShortfall::new(reason);
        tracing::debug!("trend unavailable: {}", shortfall.message);
        TrendOutcome::Insufficient(shortfall)
    }
}

/// Largest ladder rung the streak supports, with its trailing slice.
fn select_window(streak: &[Reading]) -> Option<(&'static TrendWindow, &[Reading])> {
    let first = streak.first()?;
    let last = streak.last()?;
    let streak_span = last.time - first.time;

    WINDOW_LADDER.iter().rev().find_map(|window| {
        if window.span() > streak_span {
            return None;
        }
        let cutoff = last.time - window.span();
        let from = streak.partition_point(|r| r.time < cutoff);
        let slice = &streak[from..];
        (slice.len() >= window.min_points).then_some((window, slice))
    })
}

/// Fit and extend a discharge trend for one node's readings (oldest first).
pub fn estimate_trend(readings: &[Reading]) -> TrendOutcome {
    let streak = discharge_streak(readings);
    let (first, last) = match (streak.first(), streak.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return TrendOutcome::shortfall(ShortfallReason::NoReadings),
    };

    let Some((window, slice)) = select_window(streak) else {
        let smallest = &WINDOW_LADDER[0];
        let streak_hours = elapsed_ms(first.time, last.time) / 3_600_000.0;
        return TrendOutcome::shortfall(ShortfallReason::Collecting {
            streak_hours,
            required_hours: smallest.span_hours as f64,
            points: streak.len(),
            required_points: smallest.min_points,
        });
    };

    let origin = slice[0].time;
    let xy: Vec<(f64, f64)> = slice
        .iter()
        .map(|r| (elapsed_ms(origin, r.time), r.percent))
        .collect();

    let fit = match lin_reg(&xy) {
        Some(fit) if fit.slope < 0.0 => fit,
        _ => {
            return TrendOutcome::shortfall(ShortfallReason::NoDischargeSlope {
                window_label: window.label.to_string(),
            })
        }
    };

    TrendOutcome::Fitted(TrendFit {
        points: extend_line(&fit, origin, last.time),
        window_label: window.label.to_string(),
        r_squared: fit.r_squared,
        slope_percent_per_day: fit.slope * MS_PER_DAY,
        point_count: slice.len(),
    })
}

/// Sample the fitted line from `origin` out past `latest`, stopping once it hits empty.
fn extend_line(
    fit: &LinearFit,
    origin: DateTime<Utc>,
    latest: DateTime<Utc>,
) -> Vec<ProjectionPoint> {
    let latest_x = elapsed_ms(origin, latest);
    let to_empty_ms = fit.predict(latest_x).max(0.0) / -fit.slope;
    let extension_ms =
        (to_empty_ms * TIME_TO_EMPTY_MARGIN).min(MAX_TREND_EXTENSION_DAYS as f64 * MS_PER_DAY);
    let end_x = latest_x + extension_ms;
    let step = end_x / (TREND_POINTS - 1) as f64;

    let mut points = Vec::with_capacity(TREND_POINTS);
    for i in 0..TREND_POINTS {
        let x = step * i as f64;
        let percent = fit.predict(x).clamp(0.0, 100.0);
        points.push(ProjectionPoint {
            time: offset_ms(origin, x),
            percent_remaining: percent,
        });
        if percent <= 0.0 {
            break;
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap()
    }

    /// Readings every `step_hours` falling at `drop_per_day`.
    fn discharge(count: usize, step_hours: i64, start: f64, drop_per_day: f64) -> Vec<Reading> {
        (0..count)
            .map(|i| {
                let hours = step_hours * i as i64;
                Reading {
                    time: t0() + Duration::hours(hours),
                    percent: start - drop_per_day * hours as f64 / 24.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_lin_reg_recovers_exact_line() {
        let xy: Vec<(f64, f64)> = (0..10)
            .map(|d| {
                let x = d as f64 * MS_PER_DAY;
                (x, 90.0 - 0.4 * d as f64)
            })
            .collect();
        let fit = lin_reg(&xy).unwrap();
        assert!((fit.slope - (-0.4 / MS_PER_DAY)).abs() < 1e-15);
        assert!((fit.intercept - 90.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_lin_reg_degenerate() {
        assert!(lin_reg(&[(1.0, 2.0)]).is_none());
        assert!(lin_reg(&[(5.0, 1.0), (5.0, 3.0), (5.0, 4.0)]).is_none());
        let flat = lin_reg(&[(0.0, 50.0), (1.0, 50.0), (2.0, 50.0)]).unwrap();
        assert_eq!(flat.r_squared, 0.0);
    }

    #[test]
    fn test_streak_breaks_on_recharge() {
        let mut readings = discharge(10, 1, 90.0, 2.0);
        readings.push(Reading {
            time: t0() + Duration::hours(10),
            percent: 98.0,
        });
        readings.push(Reading {
            time: t0() + Duration::hours(11),
            percent: 97.9,
        });
        let streak = discharge_streak(&readings);
        assert_eq!(streak.len(), 2);
        assert_eq!(streak[0].percent, 98.0);
    }

    #[test]
    fn test_streak_breaks_on_gap() {
        let mut readings = discharge(5, 1, 90.0, 2.0);
        readings.push(Reading {
            time: t0() + Duration::hours(9),
            percent: 89.0,
        });
        assert_eq!(discharge_streak(&readings).len(), 1);
        assert!(discharge_streak(&[]).is_empty());
    }

    #[test]
    fn test_small_rise_does_not_break_streak() {
        let readings = vec![
            Reading { time: t0(), percent: 80.0 },
            Reading { time: t0() + Duration::hours(1), percent: 82.5 },
            Reading { time: t0() + Duration::hours(2), percent: 79.0 },
        ];
        assert_eq!(discharge_streak(&readings).len(), 3);
    }

    #[test]
    fn test_insufficient_reports_progress() {
        let readings = discharge(13, 1, 90.0, 2.0);
        let TrendOutcome::Insufficient(shortfall) = estimate_trend(&readings) else {
            panic!("12 h of data should not fit a trend");
        };
        match shortfall.reason {
            ShortfallReason::Collecting {
                streak_hours,
                required_hours,
                points,
                required_points,
            } => {
                assert!((streak_hours - 12.0).abs() < 1e-9);
                assert_eq!(required_hours, 48.0);
                assert_eq!(points, 13);
                assert_eq!(required_points, 4);
            }
            other => panic!("unexpected reason {other:?}"),
        }
        assert!(shortfall.message.contains("12 of 48 h"));
    }

    #[test]
    fn test_no_readings() {
        let outcome = estimate_trend(&[]);
        assert!(matches!(
            outcome,
            TrendOutcome::Insufficient(TrendShortfall {
                reason: ShortfallReason::NoReadings,
                ..
            })
        ));
    }

    #[test]
    fn test_selects_largest_fitting_window() {
        // 10 days hourly
        let readings = discharge(241, 1, 95.0, 1.5);
        let fit = estimate_trend(&readings).fit().cloned().unwrap();
        assert_eq!(fit.window_label, "1 wk");
        assert_eq!(fit.point_count, 7 * 24 + 1);
        assert!((fit.slope_percent_per_day + 1.5).abs() < 1e-6);
        assert!(fit.r_squared > 0.999);
    }

    #[test]
    fn test_five_day_streak_uses_four_day_window() {
        let fit = estimate_trend(&discharge(121, 1, 90.0, 3.0)).fit().cloned().unwrap();
        assert_eq!(fit.window_label, "4 d");
        assert_eq!(fit.point_count, 97);
    }

    #[test]
    fn test_recent_recharge_limits_window() {
        // A week of discharge, a top-up, then two more days
        let mut readings = discharge(169, 1, 90.0, 2.0);
        let resume = readings.last().unwrap().time;
        readings.extend((1..=49).map(|h| Reading {
            time: resume + Duration::hours(h),
            percent: 99.0 - h as f64 * 0.1,
        }));
        let fit = estimate_trend(&readings).fit().cloned().unwrap();
        assert_eq!(fit.window_label, "48 h");
        assert_eq!(fit.point_count, 49);
    }

    #[test]
    fn test_rising_battery_has_no_slope() {
        let readings: Vec<Reading> = (0..60)
            .map(|h| Reading {
                time: t0() + Duration::hours(h),
                percent: 50.0 + h as f64 * 0.02,
            })
            .collect();
        let TrendOutcome::Insufficient(shortfall) = estimate_trend(&readings) else {
            panic!("rising battery should not fit");
        };
        assert_eq!(
            shortfall.reason,
            ShortfallReason::NoDischargeSlope {
                window_label: "48 h".to_string()
            }
        );
    }

    #[test]
    fn test_trend_line_reaches_zero_or_cap() {
        let readings = discharge(49, 1, 20.0, 4.0);
        let fit = estimate_trend(&readings).fit().cloned().unwrap();
        assert!(fit.points.len() <= TREND_POINTS);
        assert_eq!(fit.points[0].time, readings[0].time);
        let last = fit.points.last().unwrap();
        // 12 % left at 4 %/day: 3 days to empty, extended 5 % further
        assert!(last.percent_remaining <= 0.0 || fit.points.len() == TREND_POINTS);
        assert!(last.time > readings.last().unwrap().time);
        for pair in fit.points.windows(2) {
            assert!(pair[1].percent_remaining <= pair[0].percent_remaining);
        }
    }

    #[test]
    fn test_slow_drain_capped_at_ninety_days() {
        let readings = discharge(49, 1, 99.0, 0.1);
        let fit = estimate_trend(&readings).fit().cloned().unwrap();
        assert_eq!(fit.points.len(), TREND_POINTS);
        let end = fit.points.last().unwrap().time;
        let expected = readings.last().unwrap().time + Duration::days(MAX_TREND_EXTENSION_DAYS);
        assert!((end - expected).num_seconds().abs() <= 1);
    }
}
