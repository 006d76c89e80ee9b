//! # Configuration Management
//!
//! This module handles loading and saving the `node-forecast.toml` file. It selects the
//! tide station, sets the harvest threshold, and lets a deployment override any of the
//! hardware profile figures without restating the rest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::hardware::HardwareProfiles;
use crate::harmonics::{resolve_location, HarmonicLocation};
use crate::harvest::HarvestThreshold;

/// Default file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "node-forecast.toml";

/// Application configuration loaded from node-forecast.toml
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Tide station and curve settings
    pub tide: TideConfig,
    /// Per-day harvest threshold
    pub harvest: HarvestThreshold,
    /// Current draws and timings for the gateway and satellites
    pub hardware: HardwareProfiles,
}

/// Tide station selection and sampling
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TideConfig {
    /// Preset key ("fremantle", "funzi") or a key of `custom_locations`
    pub location: String,
    /// Curve grid spacing in minutes
    pub curve_interval_minutes: i64,
    /// How many days ahead the report covers
    pub days_ahead: u32,
    /// Additional stations with their own harmonic tables
    pub custom_locations: BTreeMap<String, HarmonicLocation>,
}

impl Default for TideConfig {
    fn default() -> Self {
        TideConfig {
            location: "fremantle".to_string(),
            curve_interval_minutes: 10,
            days_ahead: 14,
            custom_locations: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from node-forecast.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(config) => {
                tracing::info!(
                    "Loaded configuration from {} (tide location: {})",
                    path.display(),
                    config.tide.location
                );
                config
            }
            Err(e) => {
                if path.exists() {
                    tracing::warn!("Invalid config file {}: {}", path.display(), e);
                } else {
                    tracing::info!("No config file at {}", path.display());
                }
                tracing::info!("Using default configuration (Fremantle)");
                Self::default()
            }
        }
    }

    /// Load configuration, reporting why it could not be read
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save current configuration as pretty TOML
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        tracing::info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    /// The configured tide station.
    pub fn location(&self) -> Result<HarmonicLocation> {
        resolve_location(&self.tide.location, &self.tide.custom_locations)
    }
}
