//! # Harvest Planning
//!
//! Two independent signals for when the intertidal plots can be worked:
//!
//! - **Spring windows** from the moon: spring lows trail new and full moon by about a
//!   day and a half, and the week centred on that estimate has the lowest lows
//! - **Eligible days** from the tide model: calendar days (station local time) whose
//!   lowest low water is at or below the configured height
//!
//! The two are deliberately not merged. A day can be eligible outside a spring window
//! (diurnal stations such as Fremantle often are) and a spring window can contain days
//! that never drain low enough; the presentation layer decides how to combine them.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::harmonics::HarmonicLocation;
use crate::lunar::{all_events_in_range, MoonEvent};
use crate::tide_curve::{find_extrema, sample_curve, ExtremumKind, TideExtremum, TidePoint};

/// Moon events this far outside the requested range can still produce overlapping
/// windows.
const EVENT_PADDING_DAYS: i64 = 8;
/// Spring low water lags the syzygy by about this long.
const SPRING_LAG_HOURS: i64 = 36;
const WINDOW_HALF_WIDTH_DAYS: i64 = 3;
/// Grid used to find each day's lowest low.
const DAY_SCAN_INTERVAL_MINUTES: i64 = 30;

/// Height threshold for the per-day test.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestThreshold {
    pub enabled: bool,
    pub max_height_meters: f64,
}

impl Default for HarvestThreshold {
    fn default() -> Self {
        HarvestThreshold {
            enabled: true,
            max_height_meters: 0.5,
        }
    }
}

/// The spring-tide week around one new or full moon.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarvestWindow {
    pub moon_event: MoonEvent,
    pub spring_low_estimate: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl HarvestWindow {
    pub fn from_event(moon_event: MoonEvent) -> Self {
        let spring_low_estimate = moon_event.time + Duration::hours(SPRING_LAG_HOURS);
        let half_width = Duration::days(WINDOW_HALF_WIDTH_DAYS);
        HarvestWindow {
            moon_event,
            spring_low_estimate,
            start: spring_low_estimate - half_width,
            end: spring_low_estimate + half_width,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Spring windows overlapping `[start, end]`.
pub fn harvest_windows(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<HarvestWindow> {
    let padding = Duration::days(EVENT_PADDING_DAYS);
    all_events_in_range(start - padding, end + padding)
        .into_iter()
        .map(HarvestWindow::from_event)
        .filter(|w| w.end >= start && w.start <= end)
        .collect()
}

/// The lowest low water of one local calendar day.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyLow {
    pub date: NaiveDate,
    /// `None` when no low water falls inside the day
    pub lowest: Option<TideExtremum>,
}

impl DailyLow {
    pub fn is_eligible(&self, threshold: &HarvestThreshold) -> bool {
        threshold.enabled
            && self
                .lowest
                .is_some_and(|low| low.height_m <= threshold.max_height_meters)
    }
}

/// A run of consecutive eligible days.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarvestDayRange {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    /// Lowest low water anywhere in the run
    pub lowest: TideExtremum,
}

fn local_midnight(date: NaiveDate, location: &HarmonicLocation) -> Option<DateTime<Utc>> {
    date.and_time(NaiveTime::MIN)
        .and_local_timezone(location.timezone())
        .single()
        .map(|t| t.with_timezone(&Utc))
}

/// Lowest low water for each local day from `first_day` to `last_day` inclusive.
pub fn daily_lows(
    first_day: NaiveDate,
    last_day: NaiveDate,
    location: &HarmonicLocation,
) -> Vec<DailyLow> {
    let mut lows = Vec::new();
    let pad = Duration::minutes(DAY_SCAN_INTERVAL_MINUTES);
    let mut date = first_day;
    while date <= last_day {
        let next = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
        let (Some(day_start), Some(day_end)) =
            (local_midnight(date, location), local_midnight(next, location))
        else {
            break;
        };

        // One grid step either side so lows right at midnight still have neighbours
        let curve: Vec<TidePoint> =
            sample_curve(day_start - pad, day_end + pad, location, DAY_SCAN_INTERVAL_MINUTES)
                .collect();
        let lowest = find_extrema(&curve)
            .into_iter()
            .filter(|e| e.kind == ExtremumKind::Low && e.time >= day_start && e.time < day_end)
            .min_by(|a, b| a.height_m.total_cmp(&b.height_m));

        lows.push(DailyLow { date, lowest });
        date = next;
    }
    lows
}

/// Merge consecutive eligible days into ranges. Empty when the threshold is disabled.
pub fn harvest_day_ranges(
    first_day: NaiveDate,
    last_day: NaiveDate,
    location: &HarmonicLocation,
    threshold: &HarvestThreshold,
) -> Vec<HarvestDayRange> {
    if !threshold.enabled {
        return Vec::new();
    }
    let mut ranges: Vec<HarvestDayRange> = Vec::new();
    let mut open = false;
    for day in daily_lows(first_day, last_day, location) {
        let low = match day.lowest {
            Some(low) if day.is_eligible(threshold) => low,
            _ => {
                open = false;
                continue;
            }
        };
        match ranges.last_mut() {
            Some(range) if open => {
                range.last_day = day.date;
                if low.height_m < range.lowest.height_m {
                    range.lowest = low;
                }
            }
            _ => {
                ranges.push(HarvestDayRange {
                    first_day: day.date,
                    last_day: day.date,
                    lowest: low,
                });
                open = true;
            }
        }
    }
    ranges
}
