//! # Telemetry Records
//!
//! The shape in which the merged data feed hands uploads to the core, plus the two
//! views the forecasts need: one node's battery readings, and the timeline of
//! operating configurations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::device_config::DeviceConfig;
use crate::error::Result;
use crate::Reading;

/// One upload from the gateway. Battery levels are absent when a node did not report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub gateway_percent: Option<f64>,
    #[serde(default)]
    pub satellite_a_percent: Option<f64>,
    #[serde(default)]
    pub satellite_b_percent: Option<f64>,
    /// Raw operating configuration string, e.g. `fw2.4|1,1,600,900,24,3600,1,0`
    #[serde(default)]
    pub raw_config: Option<String>,
}

impl TelemetryEntry {
    pub fn config(&self) -> Option<DeviceConfig> {
        self.raw_config.as_deref().and_then(DeviceConfig::parse)
    }
}

/// The three battery-powered nodes in a deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Gateway,
    SatelliteA,
    SatelliteB,
}

impl Node {
    pub const ALL: [Node; 3] = [Node::Gateway, Node::SatelliteA, Node::SatelliteB];

    /// This node's battery level in an entry, ignoring values that are not a percentage.
    pub fn percent(&self, entry: &TelemetryEntry) -> Option<f64> {
        let value = match self {
            Node::Gateway => entry.gateway_percent,
            Node::SatelliteA => entry.satellite_a_percent,
            Node::SatelliteB => entry.satellite_b_percent,
        }?;
        (value.is_finite() && (0.0..=100.0).contains(&value)).then_some(value)
    }

    /// Whether `config` says this node is deployed. The gateway always is.
    pub fn is_installed(&self, config: &DeviceConfig) -> bool {
        match self {
            Node::Gateway => true,
            Node::SatelliteA => config.satellite_a_installed,
            Node::SatelliteB => config.satellite_b_installed,
        }
    }

    pub fn is_satellite(&self) -> bool {
        !matches!(self, Node::Gateway)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Node::Gateway => "T0",
            Node::SatelliteA => "Satellite A",
            Node::SatelliteB => "Satellite B",
        })
    }
}

/// Battery readings for one node, in upload order.
pub fn node_readings(entries: &[TelemetryEntry], node: Node) -> Vec<Reading> {
    entries
        .iter()
        .filter_map(|entry| {
            node.percent(entry).map(|percent| Reading {
                time: entry.timestamp,
                percent,
            })
        })
        .collect()
}

/// Decode an exported feed (a JSON array of entries), oldest upload first.
pub fn entries_from_json(json: &str) -> Result<Vec<TelemetryEntry>> {
    let mut entries: Vec<TelemetryEntry> = serde_json::from_str(json)?;
    entries.sort_by_key(|e| e.timestamp);
    Ok(entries)
}

/// A configuration and the instant it first appeared.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigSegment {
    pub start: DateTime<Utc>,
    pub config: DeviceConfig,
}

/// Every distinct run of configuration in the feed.
///
/// Entries without a usable configuration keep the current one in force.
pub fn config_timeline(entries: &[TelemetryEntry]) -> Vec<ConfigSegment> {
    let mut segments: Vec<ConfigSegment> = Vec::new();
    for entry in entries {
        let Some(config) = entry.config() else {
            continue;
        };
        match segments.last() {
            Some(current) if current.config == config => {}
            previous => {
                if previous.is_some() {
                    tracing::info!(
                        "configuration changed at {}: {}",
                        entry.timestamp,
                        config.summary()
                    );
                }
                segments.push(ConfigSegment {
                    start: entry.timestamp,
                    config,
                });
            }
        }
    }
    segments
}
