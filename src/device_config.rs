//! # Device Operating Configuration
//!
//! Each telemetry upload carries the gateway's current operating configuration as a
//! compact string. Everything before the pipe is firmware metadata we ignore; the eight
//! comma-separated tokens after it are decoded positionally:
//!
//! ```text
//! fw2.4|1,1,600,900,24,3600,1,0
//!       │ │  │   │  │   │   │ └ satellite B installed (0/1)
//!       │ │  │   │  │   │   └── satellite A installed (0/1)
//!       │ │  │   │  │   └────── peer sync period (s)
//!       │ │  │   │  └────────── bulk upload frequency (h)
//!       │ │  │   └───────────── bulk upload row interval (s)
//!       │ │  └───────────────── sample period (s)
//!       │ └──────────────────── sleep enabled (0/1)
//!       └────────────────────── deploy mode (0 = WiFi, 1 = cellular)
//! ```
//!
//! Decoding is strict: a field that does not parse, or falls outside its valid range,
//! makes the whole configuration absent rather than leaking a NaN into the energy model.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of positional tokens after the pipe.
pub const CONFIG_TOKEN_COUNT: usize = 8;

pub const MIN_SAMPLE_PERIOD_S: u32 = 10;
pub const MIN_BULK_INTERVAL_S: u32 = 60;
pub const MIN_BULK_FREQUENCY_H: f64 = 1.0;
pub const MIN_PEER_SYNC_PERIOD_S: u32 = 60;

/// How the gateway reaches the internet for bulk uploads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployMode {
    Wifi,
    Cellular,
}

/// Decoded operating configuration shared by the gateway and its satellites.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub deploy_mode: DeployMode,
    pub sleep_enabled: bool,
    pub sample_period_s: u32,
    pub bulk_upload_interval_s: u32,
    pub bulk_upload_frequency_h: f64,
    pub peer_sync_period_s: u32,
    pub satellite_a_installed: bool,
    pub satellite_b_installed: bool,
}

/// Names of the positional fields, used in decode errors and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigField {
    DeployMode,
    SleepEnabled,
    SamplePeriod,
    BulkUploadInterval,
    BulkUploadFrequency,
    PeerSyncPeriod,
    SatelliteA,
    SatelliteB,
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigField::DeployMode => "deploy mode",
            ConfigField::SleepEnabled => "sleep enable",
            ConfigField::SamplePeriod => "sample period",
            ConfigField::BulkUploadInterval => "bulk upload interval",
            ConfigField::BulkUploadFrequency => "bulk upload frequency",
            ConfigField::PeerSyncPeriod => "peer sync period",
            ConfigField::SatelliteA => "satellite A flag",
            ConfigField::SatelliteB => "satellite B flag",
        };
        f.write_str(name)
    }
}

/// Why a raw string did not yield a configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigDecodeError {
    #[error("no configuration present")]
    NoConfig,

    #[error("expected 8 tokens, found {0}")]
    TooFewTokens(usize),

    #[error("{0} is missing or not a number")]
    Missing(ConfigField),

    #[error("{0} is out of range")]
    OutOfRange(ConfigField),
}

impl DeviceConfig {
    /// Decode a raw telemetry config field, reporting why it failed.
    pub fn decode(raw: &str) -> Result<Self, ConfigDecodeError> {
        let (_, payload) = raw.split_once('|').ok_or(ConfigDecodeError::NoConfig)?;
        let tokens: Vec<&str> = payload.split(',').map(str::trim).collect();
        if tokens.len() < CONFIG_TOKEN_COUNT {
            return Err(ConfigDecodeError::TooFewTokens(tokens.len()));
        }

        let deploy_mode = match flag(tokens[0], ConfigField::DeployMode)? {
            false => DeployMode::Wifi,
            true => DeployMode::Cellular,
        };
        let sleep_enabled = flag(tokens[1], ConfigField::SleepEnabled)?;
        let sample_period_s = seconds(tokens[2], ConfigField::SamplePeriod, MIN_SAMPLE_PERIOD_S)?;
        let bulk_upload_interval_s =
            seconds(tokens[3], ConfigField::BulkUploadInterval, MIN_BULK_INTERVAL_S)?;
        let bulk_upload_frequency_h = number(tokens[4], ConfigField::BulkUploadFrequency)?;
        if bulk_upload_frequency_h < MIN_BULK_FREQUENCY_H {
            return Err(ConfigDecodeError::OutOfRange(
                ConfigField::BulkUploadFrequency,
            ));
        }
        let peer_sync_period_s =
            seconds(tokens[5], ConfigField::PeerSyncPeriod, MIN_PEER_SYNC_PERIOD_S)?;
        let satellite_a_installed = flag(tokens[6], ConfigField::SatelliteA)?;
        let satellite_b_installed = flag(tokens[7], ConfigField::SatelliteB)?;

        Ok(DeviceConfig {
            deploy_mode,
            sleep_enabled,
            sample_period_s,
            bulk_upload_interval_s,
            bulk_upload_frequency_h,
            peer_sync_period_s,
            satellite_a_installed,
            satellite_b_installed,
        })
    }

    /// Decode a raw config field; `None` means "no configuration present".
    pub fn parse(raw: &str) -> Option<Self> {
        match Self::decode(raw) {
            Ok(config) => Some(config),
            Err(ConfigDecodeError::NoConfig) => None,
            Err(err) => {
                tracing::debug!("ignoring config field {:?}: {}", raw, err);
                None
            }
        }
    }

    /// Re-encode as the payload the firmware would upload.
    pub fn to_raw(&self) -> String {
        format!(
            "|{},{},{},{},{},{},{},{}",
            u8::from(self.deploy_mode == DeployMode::Cellular),
            u8::from(self.sleep_enabled),
            self.sample_period_s,
            self.bulk_upload_interval_s,
            self.bulk_upload_frequency_h,
            self.peer_sync_period_s,
            u8::from(self.satellite_a_installed),
            u8::from(self.satellite_b_installed),
        )
    }

    /// Short human-readable description for labels.
    pub fn summary(&self) -> String {
        let mode = match self.deploy_mode {
            DeployMode::Wifi => "WiFi",
            DeployMode::Cellular => "cellular",
        };
        let sleep = if self.sleep_enabled { "sleep on" } else { "sleep off" };
        let satellites = match (self.satellite_a_installed, self.satellite_b_installed) {
            (true, true) => "sats A+B",
            (true, false) => "sat A",
            (false, true) => "sat B",
            (false, false) => "no sats",
        };
        format!(
            "{mode}, {sleep}, sample {}s, upload every {}h ({}s rows), sync {}s, {satellites}",
            self.sample_period_s,
            self.bulk_upload_frequency_h,
            self.bulk_upload_interval_s,
            self.peer_sync_period_s,
        )
    }

    pub fn installed_satellites(&self) -> u32 {
        u32::from(self.satellite_a_installed) + u32::from(self.satellite_b_installed)
    }
}

/// True when any of the eight fields differs.
pub fn config_changed(a: &DeviceConfig, b: &DeviceConfig) -> bool {
    a != b
}

fn number(token: &str, field: ConfigField) -> Result<f64, ConfigDecodeError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(ConfigDecodeError::Missing(field))
}

fn flag(token: &str, field: ConfigField) -> Result<bool, ConfigDecodeError> {
    match number(token, field)? {
        v if v == 0.0 => Ok(false),
        v if v == 1.0 => Ok(true),
        _ => Err(ConfigDecodeError::OutOfRange(field)),
    }
}

fn seconds(token: &str, field: ConfigField, min: u32) -> Result<u32, ConfigDecodeError> {
    let value = number(token, field)?;
    if value.fract() != 0.0 || value < f64::from(min) || value > f64::from(u32::MAX) {
        return Err(ConfigDecodeError::OutOfRange(field));
    }
    Ok(value as u32)
}
