//! # Harmonic Tide Synthesis
//!
//! Reconstructs tide height as a sum of seven astronomical constituents:
//!
//! ```text
//! h(t) = Z0 + Σ f·A·cos(ω·t + (V0+u) − g)
//! ```
//!
//! where `t` is hours since 2000-01-01 12:00 UTC, `ω` the constituent's angular speed,
//! `V0` its equilibrium argument at that epoch, `f`/`u` the nodal amplitude and phase
//! corrections, and `A`/`g` the station's fitted amplitude and phase lag.
//!
//! ## Accuracy Trade-offs
//! The nodal corrections follow the 18.6-year lunar node cycle. They are held constant
//! here, which keeps the model a handful of multiplications per constituent and is good
//! to a few centimetres over the multi-year window the deployment runs in:
//! - ✅ **Correct periods** for all seven constituents
//! - ✅ **Diurnal inequality** from K1/O1/P1, which dominates at Fremantle
//! - ✅ **Spring–neap cycle** from the M2/S2 beat
//! - ❌ **No shallow-water or meteorological terms**
//! - ❌ **Nodal drift ignored** far from the epoch

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ForecastError, Result};

/// Reference instant for the equilibrium arguments: 2000-01-01 12:00 UTC.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// The seven constituents the model carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstituentId {
    /// Principal lunar semidiurnal
    M2,
    /// Principal solar semidiurnal
    S2,
    /// Larger lunar elliptic semidiurnal
    N2,
    /// Lunisolar diurnal
    K1,
    /// Principal lunar diurnal
    O1,
    /// Principal solar diurnal
    P1,
    /// Lunisolar semidiurnal
    K2,
}

/// Astronomical constants for one constituent at the epoch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Astronomical {
    /// Degrees per hour
    pub speed: f64,
    /// Equilibrium argument V0 at the epoch, degrees
    pub equilibrium_argument: f64,
    /// Nodal amplitude factor f
    pub nodal_factor: f64,
    /// Nodal phase correction u, degrees
    pub nodal_correction: f64,
}

impl ConstituentId {
    pub const ALL: [ConstituentId; 7] = [
        ConstituentId::M2,
        ConstituentId::S2,
        ConstituentId::N2,
        ConstituentId::K1,
        ConstituentId::O1,
        ConstituentId::P1,
        ConstituentId::K2,
    ];

    // V0 from the mean longitudes at the epoch (s = 218.3165, h = 280.4665,
    // p = 83.3532, T = 0); f and u for a lunar node longitude of 125.04.
    pub fn astronomical(&self) -> Astronomical {
        let (speed, equilibrium_argument, nodal_factor, nodal_correction) = match self {
            ConstituentId::M2 => (28.984_104_2, 124.300, 1.0218, -1.75),
            ConstituentId::S2 => (30.000_000_0, 0.000, 1.0000, 0.00),
            ConstituentId::N2 => (28.439_729_5, 349.337, 1.0218, -1.75),
            ConstituentId::K1 => (15.041_068_6, 10.467, 0.9400, -7.26),
            ConstituentId::O1 => (13.943_035_6, 113.834, 0.9016, 8.85),
            ConstituentId::P1 => (14.958_931_4, 349.534, 1.0000, 0.00),
            ConstituentId::K2 => (30.082_137_3, 200.933, 0.8599, -14.53),
        };
        Astronomical {
            speed,
            equilibrium_argument,
            nodal_factor,
            nodal_correction,
        }
    }

    /// Period in hours.
    pub fn period_hours(&self) -> f64 {
        360.0 / self.astronomical().speed
    }
}

/// A station's fitted amplitude and phase lag for one constituent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TidalConstituent {
    pub id: ConstituentId,
    pub amplitude_m: f64,
    pub phase_deg: f64,
}

/// Harmonic description of one tide station.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarmonicLocation {
    pub name: String,
    /// Mean water level above chart datum, metres
    pub mean_level_m: f64,
    /// Offset of local civil time from UTC, used for calendar days
    #[serde(default)]
    pub utc_offset_hours: f64,
    pub constituents: Vec<TidalConstituent>,
}

impl HarmonicLocation {
    pub fn timezone(&self) -> FixedOffset {
        let seconds = (self.utc_offset_hours * 3600.0).round() as i32;
        FixedOffset::east_opt(seconds).unwrap_or_else(|| Utc.fix())
    }

    /// Height at the epoch itself, where the time term vanishes.
    pub fn height_at_epoch(&self) -> f64 {
        height_at(epoch(), self)
    }
}

fn constituent(id: ConstituentId, amplitude_m: f64, phase_deg: f64) -> TidalConstituent {
    TidalConstituent {
        id,
        amplitude_m,
        phase_deg,
    }
}

/// Fremantle, Western Australia: small, diurnal-dominant tides.
pub fn fremantle() -> HarmonicLocation {
    use ConstituentId::*;
    HarmonicLocation {
        name: "Fremantle".to_string(),
        mean_level_m: 0.76,
        utc_offset_hours: 8.0,
        constituents: vec![
            constituent(M2, 0.046, 302.0),
            constituent(S2, 0.052, 300.0),
            constituent(N2, 0.012, 286.0),
            constituent(K1, 0.173, 292.0),
            constituent(O1, 0.118, 270.0),
            constituent(P1, 0.054, 289.0),
            constituent(K2, 0.014, 298.0),
        ],
    }
}

/// Funzi Bay, southern Kenya coast: large, semidiurnal-dominant tides.
pub fn funzi() -> HarmonicLocation {
    use ConstituentId::*;
    HarmonicLocation {
        name: "Funzi".to_string(),
        mean_level_m: 1.96,
        utc_offset_hours: 3.0,
        constituents: vec![
            constituent(M2, 1.082, 101.0),
            constituent(S2, 0.547, 139.0),
            constituent(N2, 0.203, 84.0),
            constituent(K1, 0.191, 11.0),
            constituent(O1, 0.108, 356.0),
            constituent(P1, 0.062, 10.0),
            constituent(K2, 0.151, 134.0),
        ],
    }
}

/// Keys of the built-in stations.
pub const PRESET_KEYS: [&str; 2] = ["fremantle", "funzi"];

/// Look up a station, preferring `custom` entries over the presets.
pub fn resolve_location(
    key: &str,
    custom: &BTreeMap<String, HarmonicLocation>,
) -> Result<HarmonicLocation> {
    if let Some(location) = custom.get(key) {
        return Ok(location.clone());
    }
    match key {
        "fremantle" => Ok(fremantle()),
        "funzi" => Ok(funzi()),
        _ => Err(ForecastError::UnknownLocation(key.to_string())),
    }
}

/// Tide height in metres above chart datum at `instant`.
pub fn height_at(instant: DateTime<Utc>, location: &HarmonicLocation) -> f64 {
    let hours = (instant - epoch()).num_milliseconds() as f64 / 3_600_000.0;
    location.mean_level_m
        + location
            .constituents
            .iter()
            .map(|c| {
                let a = c.id.astronomical();
                let angle = a.speed * hours + a.equilibrium_argument + a.nodal_correction
                    - c.phase_deg;
                a.nodal_factor * c.amplitude_m * angle.to_radians().cos()
            })
            .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_epoch_height_matches_constituent_table() {
        let location = fremantle();
        let expected = location.mean_level_m
            + location
                .constituents
                .iter()
                .map(|c| {
                    let a = c.id.astronomical();
                    a.nodal_factor
                        * c.amplitude_m
                        * (a.equilibrium_argument + a.nodal_correction - c.phase_deg)
                            .to_radians()
                            .cos()
                })
                .sum::<f64>();
        assert!((location.height_at_epoch() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_single_constituent_at_epoch_is_literal() {
        let location = HarmonicLocation {
            name: "test".to_string(),
            mean_level_m: 1.0,
            utc_offset_hours: 0.0,
            constituents: vec![constituent(ConstituentId::S2, 0.5, 0.0)],
        };
        // S2 has V0 = u = 0 and f = 1, so cos(0) = 1
        assert!((height_at(epoch(), &location) - 1.5).abs() < 1e-12);
        // half a period later it is at its trough
        let half = epoch() + Duration::hours(6);
        assert!((height_at(half, &location) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_m2_only_location_is_periodic() {
        let location = HarmonicLocation {
            name: "m2".to_string(),
            mean_level_m: 0.0,
            utc_offset_hours: 0.0,
            constituents: vec![constituent(ConstituentId::M2, 1.0, 45.0)],
        };
        let period_ms = (ConstituentId::M2.period_hours() * 3_600_000.0).round() as i64;
        let t = Utc.with_ymd_and_hms(2025, 8, 3, 5, 17, 0).unwrap();
        let later = t + Duration::milliseconds(period_ms);
        assert!((height_at(t, &location) - height_at(later, &location)).abs() < 1e-6);
    }

    #[test]
    fn test_semidiurnal_station_repeats_within_amplitude_tolerance() {
        let location = funzi();
        let period_ms = (ConstituentId::M2.period_hours() * 3_600_000.0).round() as i64;
        let total_amplitude: f64 = location.constituents.iter().map(|c| c.amplitude_m).sum();
        let t = Utc.with_ymd_and_hms(2025, 8, 3, 5, 17, 0).unwrap();
        let later = t + Duration::milliseconds(period_ms);
        let diff = (height_at(t, &location) - height_at(later, &location)).abs();
        assert!(diff < total_amplitude, "diff {diff}");
    }

    #[test]
    fn test_funzi_range_is_larger_than_fremantle() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let range = |location: &HarmonicLocation| {
            let heights: Vec<f64> = (0..24 * 30)
                .map(|h| height_at(start + Duration::hours(h), location))
                .collect();
            let max = heights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let min = heights.iter().cloned().fold(f64::INFINITY, f64::min);
            max - min
        };
        let fremantle_range = range(&fremantle());
        let funzi_range = range(&funzi());
        assert!((0.3..=1.5).contains(&fremantle_range), "{fremantle_range}");
        assert!((2.0..=5.0).contains(&funzi_range), "{funzi_range}");
    }

    #[test]
    fn test_resolve_location() {
        let mut custom = BTreeMap::new();
        assert_eq!(resolve_location("funzi", &custom).unwrap().name, "Funzi");
        assert!(matches!(
            resolve_location("atlantis", &custom),
            Err(ForecastError::UnknownLocation(key)) if key == "atlantis"
        ));

        let mut own = fremantle();
        own.name = "Override".to_string();
        custom.insert("fremantle".to_string(), own);
        assert_eq!(resolve_location("fremantle", &custom).unwrap().name, "Override");
    }

    #[test]
    fn test_unknown_location_lists_presets() {
        let err = resolve_location("atlantis", &BTreeMap::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown tide location: atlantis (presets: fremantle, funzi)"
        );
        for key in PRESET_KEYS {
            assert!(resolve_location(key, &BTreeMap::new()).is_ok());
        }
    }

    #[test]
    fn test_periods_split_into_bands() {
        for id in ConstituentId::ALL {
            let period = id.period_hours();
            let diurnal = matches!(id, ConstituentId::K1 | ConstituentId::O1 | ConstituentId::P1);
            if diurnal {
                assert!((23.0..27.0).contains(&period), "{id:?} {period}");
            } else {
                assert!((11.5..12.7).contains(&period), "{id:?} {period}");
            }
        }
    }

    #[test]
    fn test_location_timezone() {
        assert_eq!(fremantle().timezone().local_minus_utc(), 8 * 3600);
        assert_eq!(funzi().timezone().local_minus_utc(), 3 * 3600);
    }
}
