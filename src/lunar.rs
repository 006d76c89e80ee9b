//! Moon phase from mean synodic-month arithmetic.
//!
//! Phase is the fraction of the synodic month elapsed since a reference new moon
//! (2000-01-06 18:14 UTC). The mean month ignores the Moon's orbital eccentricity, so
//! individual new and full moons can be off by up to ~14 hours; that is well inside the
//! ±3 day harvest windows built on top of it.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core::f64::consts::TAU;
use serde::{Deserialize, Serialize};

use crate::{elapsed_ms, offset_ms, MS_PER_DAY};

/// Mean synodic month in days.
pub const SYNODIC_MONTH_DAYS: f64 = 29.530_588_853;

/// `next_event` never returns an event closer than this fraction of a month.
const MIN_LOOKAHEAD: f64 = 0.005;

/// Same-kind events closer than this are the same event.
const DEDUP_WINDOW_HOURS: i64 = 48;

/// Reference new moon: 2000-01-06 18:14 UTC.
pub fn reference_new_moon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 6, 18, 14, 0)
        .single()
        .unwrap_or_default()
}

fn synodic_month_ms() -> f64 {
    SYNODIC_MONTH_DAYS * MS_PER_DAY
}

/// Fraction of the lunation elapsed at `instant`, in `[0, 1)`. 0 is new, 0.5 full.
pub fn phase_fraction(instant: DateTime<Utc>) -> f64 {
    let cycles = elapsed_ms(reference_new_moon(), instant) / synodic_month_ms();
    let frac = cycles - cycles.floor();
    // rounding can land exactly on 1.0 just below a new moon
    if frac >= 1.0 {
        0.0
    } else {
        frac
    }
}

/// Moon age in days since the last new moon.
pub fn age_days(instant: DateTime<Utc>) -> f64 {
    phase_fraction(instant) * SYNODIC_MONTH_DAYS
}

/// Illuminated fraction as a whole percentage.
pub fn illumination_percent(instant: DateTime<Utc>) -> u8 {
    let phase = phase_fraction(instant);
    ((1.0 - (TAU * phase).cos()) / 2.0 * 100.0).round() as u8
}

/// The eight traditional phase names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl PhaseName {
    /// Phase name for a phase fraction, each name covering an eighth of the month
    /// centred on its nominal phase.
    pub fn from_fraction(phase: f64) -> Self {
        let index = ((phase * 8.0) + 0.5).floor() as u8 & 7;
        match index {
            0 => PhaseName::NewMoon,
            1 => PhaseName::WaxingCrescent,
            2 => PhaseName::FirstQuarter,
            3 => PhaseName::WaxingGibbous,
            4 => PhaseName::FullMoon,
            5 => PhaseName::WaningGibbous,
            6 => PhaseName::LastQuarter,
            _ => PhaseName::WaningCrescent,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PhaseName::NewMoon => "New Moon",
            PhaseName::WaxingCrescent => "Waxing Crescent",
            PhaseName::FirstQuarter => "First Quarter",
            PhaseName::WaxingGibbous => "Waxing Gibbous",
            PhaseName::FullMoon => "Full Moon",
            PhaseName::WaningGibbous => "Waning Gibbous",
            PhaseName::LastQuarter => "Last Quarter",
            PhaseName::WaningCrescent => "Waning Crescent",
        }
    }
}

pub fn phase_name(instant: DateTime<Utc>) -> PhaseName {
    PhaseName::from_fraction(phase_fraction(instant))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoonEventKind {
    New,
    Full,
}

impl MoonEventKind {
    pub fn target_phase(&self) -> f64 {
        match self {
            MoonEventKind::New => 0.0,
            MoonEventKind::Full => 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoonEvent {
    pub time: DateTime<Utc>,
    pub kind: MoonEventKind,
}

/// First instant strictly after `from` at which the phase reaches `kind`'s target.
///
/// An event less than half a percent of a month away is skipped in favour of the
/// following one, so asking again from an event's own time moves forward.
pub fn next_event(from: DateTime<Utc>, kind: MoonEventKind) -> MoonEvent {
    let phase = phase_fraction(from);
    let mut delta = (kind.target_phase() - phase).rem_euclid(1.0);
    if delta < MIN_LOOKAHEAD {
        delta += 1.0;
    }
    MoonEvent {
        time: offset_ms(from, delta * synodic_month_ms()),
        kind,
    }
}

/// All new and full moons in `[start, end]`, oldest first.
pub fn all_events_in_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MoonEvent> {
    let mut events: Vec<MoonEvent> = Vec::new();
    if end < start {
        return events;
    }
    let dedup_ms = Duration::hours(DEDUP_WINDOW_HOURS).num_milliseconds();
    // Start a day early so an event just after `start` is not hidden by the lookahead
    let mut cursor = start - Duration::days(1);
    while cursor <= end {
        for kind in [MoonEventKind::New, MoonEventKind::Full] {
            let event = next_event(cursor, kind);
            if event.time < start || event.time > end {
                continue;
            }
            let duplicate = events.iter().any(|e| {
                e.kind == kind && (e.time - event.time).num_milliseconds().abs() < dedup_ms
            });
            if !duplicate {
                events.push(event);
            }
        }
        cursor += Duration::days(1);
    }
    events.sort_by_key(|e| e.time);
    events
}
