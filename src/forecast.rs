//! # Per-Node Battery Forecasts
//!
//! Ties the energy model together for one node: find the configuration in force, work
//! out its daily draw, anchor a projection on the first reading taken under that
//! configuration, score the projection against later readings and fit the observed
//! trend.
//!
//! ## Anchor continuity
//! The anchor only moves when the configuration changes. Callers usually recompute over
//! a sliding window of telemetry, so the reading that started the current configuration
//! can fall out of the window; [`NodeForecastState`] remembers it. When a new
//! configuration has no reading yet, the previous curve stays visible and is flagged as
//! carried over. The state is a plain value: pass it in, keep what comes back.

use serde::{Deserialize, Serialize};

use crate::device_config::DeviceConfig;
use crate::energy::{EnergyBudget, EnergyModel};
use crate::hardware::HardwareProfiles;
use crate::projection::{evaluate_accuracy, project, Accuracy, ProjectionParams};
use crate::telemetry::{config_timeline, node_readings, Node, TelemetryEntry};
use crate::trend::{estimate_trend, TrendOutcome};
use crate::{ProjectionPoint, Reading};

/// What a node's forecast remembers between recomputations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeForecastState {
    pub last_anchor: Option<Reading>,
    pub previous_curve: Vec<ProjectionPoint>,
    pub config: Option<DeviceConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    /// Projection anchored on a reading under the current configuration
    Current,
    /// No reading under the current configuration yet; showing the last curve
    CarriedOver,
    /// No anchor and nothing to carry over
    AwaitingReading,
    /// No configuration has been seen in the feed
    NoConfiguration,
    /// The configuration says this satellite is not deployed
    NotInstalled,
}

/// Everything a chart needs for one node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeForecast {
    pub node: Node,
    pub status: ForecastStatus,
    pub config: Option<DeviceConfig>,
    pub budget: Option<EnergyBudget>,
    pub anchor: Option<Reading>,
    pub projection: Vec<ProjectionPoint>,
    pub accuracy: Option<Accuracy>,
    pub trend: TrendOutcome,
}

impl NodeForecast {
    pub fn lifetime_days(&self) -> Option<f64> {
        self.budget.as_ref().and_then(EnergyBudget::lifetime_days)
    }
}

fn budget_for(
    node: Node,
    config: &DeviceConfig,
    profiles: &HardwareProfiles,
) -> (EnergyBudget, f64, f64) {
    if node.is_satellite() {
        let p = &profiles.satellite;
        (p.daily_budget(config), p.battery_capacity_mah, p.derating)
    } else {
        let p = &profiles.gateway;
        (p.daily_budget(config), p.battery_capacity_mah, p.derating)
    }
}

/// Forecast one node from the telemetry window, returning the updated state.
pub fn forecast_node(
    state: NodeForecastState,
    entries: &[TelemetryEntry],
    node: Node,
    profiles: &HardwareProfiles,
) -> (NodeForecast, NodeForecastState) {
    let readings = node_readings(entries, node);
    let trend = estimate_trend(&readings);
    let timeline = config_timeline(entries);
    let segment = timeline.last().copied();

    let mut forecast = NodeForecast {
        node,
        status: ForecastStatus::NoConfiguration,
        config: None,
        budget: None,
        anchor: None,
        projection: Vec::new(),
        accuracy: None,
        trend,
    };

    let Some(config) = segment.map(|s| s.config).or(state.config) else {
        forecast.projection = state.previous_curve.clone();
        return (forecast, state);
    };
    forecast.config = Some(config);

    if !node.is_installed(&config) {
        forecast.status = ForecastStatus::NotInstalled;
        let state = NodeForecastState {
            config: Some(config),
            ..NodeForecastState::default()
        };
        return (forecast, state);
    }

    let (budget, capacity, derating) = budget_for(node, &config, profiles);

    // A stored anchor predating the current segment belongs to an earlier run of the
    // same settings, unless the window shows no other configuration at all.
    let same_config = state.config == Some(config);
    let same_run = |anchor: &Reading| {
        timeline.len() <= 1 || segment.map_or(true, |s| anchor.time >= s.start)
    };
    let anchor = match state.last_anchor {
        Some(anchor) if same_config && same_run(&anchor) => Some(anchor),
        _ => {
            let since = segment.map(|s| s.start);
            readings
                .iter()
                .find(|r| since.map_or(true, |start| r.time >= start))
                .copied()
        }
    };

    let next_state = match anchor {
        Some(anchor) => {
            let projection: Vec<ProjectionPoint> = project(ProjectionParams {
                anchor_percent: anchor.percent,
                anchor_time: anchor.time,
                daily_consumption_mah: budget.daily_total_mah,
                battery_capacity_mah: capacity,
                derating,
                max_days: None,
            })
            .collect();

            forecast.status = ForecastStatus::Current;
            forecast.accuracy = evaluate_accuracy(&readings, anchor.time, &projection);
            forecast.anchor = Some(anchor);
            forecast.projection = projection.clone();

            NodeForecastState {
                last_anchor: Some(anchor),
                previous_curve: projection,
                config: Some(config),
            }
        }
        None if !state.previous_curve.is_empty() => {
            tracing::debug!(
                "{node}: no reading under the new configuration, keeping previous curve"
            );
            forecast.status = ForecastStatus::CarriedOver;
            forecast.anchor = state.last_anchor;
            forecast.projection = state.previous_curve.clone();
            NodeForecastState {
                config: Some(config),
                ..state
            }
        }
        None => {
            forecast.status = ForecastStatus::AwaitingReading;
            NodeForecastState {
                config: Some(config),
                ..state
            }
        }
    };

    forecast.budget = Some(budget);
    (forecast, next_state)
}

/// Forecast state for the whole deployment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    pub gateway: NodeForecastState,
    pub satellite_a: NodeForecastState,
    pub satellite_b: NodeForecastState,
}

impl DeploymentState {
    fn take(&mut self, node: Node) -> NodeForecastState {
        std::mem::take(match node {
            Node::Gateway => &mut self.gateway,
            Node::SatelliteA => &mut self.satellite_a,
            Node::SatelliteB => &mut self.satellite_b,
        })
    }

    fn put(&mut self, node: Node, state: NodeForecastState) {
        match node {
            Node::Gateway => self.gateway = state,
            Node::SatelliteA => self.satellite_a = state,
            Node::SatelliteB => self.satellite_b = state,
        }
    }
}

/// Forecast all three nodes.
pub fn forecast_deployment(
    mut state: DeploymentState,
    entries: &[TelemetryEntry],
    profiles: &HardwareProfiles,
) -> (Vec<NodeForecast>, DeploymentState) {
    let mut forecasts = Vec::with_capacity(Node::ALL.len());
    for node in Node::ALL {
        let (forecast, next) = forecast_node(state.take(node), entries, node, profiles);
        state.put(node, next);
        forecasts.push(forecast);
    }
    (forecasts, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const CONFIG_A: &str = "fw|1,1,600,900,24,3600,1,0";
    const CONFIG_B: &str = "fw|0,1,300,900,12,3600,1,0";

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn hourly(from_hour: i64, count: i64, start_percent: f64, config: &str) -> Vec<TelemetryEntry> {
        (0..count)
            .map(|i| TelemetryEntry {
                timestamp: start() + Duration::hours(from_hour + i),
                gateway_percent: Some(start_percent - i as f64 * 0.1),
                satellite_a_percent: Some(start_percent - 1.0 - i as f64 * 0.05),
                satellite_b_percent: None,
                raw_config: Some(config.to_string()),
            })
            .collect()
    }

    #[test]
    fn test_gateway_forecast_anchors_on_first_reading() {
        let entries = hourly(0, 24, 90.0, CONFIG_A);
        let (forecast, state) = forecast_node(
            NodeForecastState::default(),
            &entries,
            Node::Gateway,
            &HardwareProfiles::default(),
        );
        assert_eq!(forecast.status, ForecastStatus::Current);
        let anchor = forecast.anchor.unwrap();
        assert_eq!(anchor.time, start());
        assert_eq!(forecast.projection[0].percent_remaining, 90.0);
        assert!(forecast.lifetime_days().unwrap() > 1.0);
        assert!(forecast.accuracy.is_some());
        assert_eq!(state.last_anchor, Some(anchor));
        assert_eq!(state.previous_curve, forecast.projection);
    }

    #[test]
    fn test_anchor_survives_sliding_window() {
        let profiles = HardwareProfiles::default();
        let entries = hourly(0, 48, 90.0, CONFIG_A);
        let (first, state) =
            forecast_node(NodeForecastState::default(), &entries, Node::Gateway, &profiles);

        // Later window no longer contains the anchor reading
        let (second, _) = forecast_node(state, &entries[24..], Node::Gateway, &profiles);
        assert_eq!(second.anchor, first.anchor);
        assert_eq!(second.projection, first.projection);
    }

    #[test]
    fn test_config_change_moves_anchor() {
        let profiles = HardwareProfiles::default();
        let mut entries = hourly(0, 24, 90.0, CONFIG_A);
        let (_, state) =
            forecast_node(NodeForecastState::default(), &entries, Node::Gateway, &profiles);

        entries.extend(hourly(24, 5, 80.0, CONFIG_B));
        let (forecast, state) = forecast_node(state, &entries, Node::Gateway, &profiles);
        let anchor = forecast.anchor.unwrap();
        assert_eq!(anchor.time, start() + Duration::hours(24));
        assert_eq!(anchor.percent, 80.0);
        assert_eq!(state.config, DeviceConfig::parse(CONFIG_B));
    }

    #[test]
    fn test_return_to_earlier_config_reanchors() {
        let profiles = HardwareProfiles::default();
        let mut entries = hourly(0, 5, 90.0, CONFIG_A);
        let (first, state) =
            forecast_node(NodeForecastState::default(), &entries, Node::Gateway, &profiles);
        assert_eq!(first.anchor.unwrap().time, start());

        // A -> B -> A between two recomputations; the state still remembers A
        entries.extend(hourly(5, 25, 89.0, CONFIG_B));
        entries.extend(hourly(30, 5, 85.0, CONFIG_A));
        assert_eq!(state.config, DeviceConfig::parse(CONFIG_A));

        let (forecast, state) = forecast_node(state, &entries, Node::Gateway, &profiles);
        let anchor = forecast.anchor.unwrap();
        assert_eq!(anchor.time, start() + Duration::hours(30));
        assert_eq!(anchor.percent, 85.0);
        assert_eq!(forecast.projection[0].time, anchor.time);
        assert_eq!(state.last_anchor, Some(anchor));
    }

    #[test]
    fn test_new_config_without_reading_carries_curve() {
        let profiles = HardwareProfiles::default();
        let entries = hourly(0, 24, 90.0, CONFIG_A);
        let (first, state) =
            forecast_node(NodeForecastState::default(), &entries, Node::Gateway, &profiles);

        let mut changed = entries.clone();
        changed.push(TelemetryEntry {
            timestamp: start() + Duration::hours(30),
            gateway_percent: None,
            satellite_a_percent: None,
            satellite_b_percent: None,
            raw_config: Some(CONFIG_B.to_string()),
        });
        let (forecast, _) = forecast_node(state, &changed, Node::Gateway, &profiles);
        assert_eq!(forecast.status, ForecastStatus::CarriedOver);
        assert_eq!(forecast.projection, first.projection);
        assert_eq!(forecast.config, DeviceConfig::parse(CONFIG_B));
    }

    #[test]
    fn test_satellite_not_installed() {
        let entries = hourly(0, 4, 90.0, CONFIG_A);
        let (forecast, state) = forecast_node(
            NodeForecastState::default(),
            &entries,
            Node::SatelliteB,
            &HardwareProfiles::default(),
        );
        assert_eq!(forecast.status, ForecastStatus::NotInstalled);
        assert!(forecast.projection.is_empty());
        assert!(state.last_anchor.is_none());
    }

    #[test]
    fn test_no_configuration_in_feed() {
        let entries: Vec<TelemetryEntry> = hourly(0, 4, 90.0, "no pipe here");
        let (forecast, state) = forecast_node(
            NodeForecastState::default(),
            &entries,
            Node::Gateway,
            &HardwareProfiles::default(),
        );
        assert_eq!(forecast.status, ForecastStatus::NoConfiguration);
        assert!(forecast.budget.is_none());
        assert_eq!(state, NodeForecastState::default());
    }

    #[test]
    fn test_deployment_forecasts_every_node() {
        let entries = hourly(0, 24, 95.0, CONFIG_A);
        let (forecasts, state) = forecast_deployment(
            DeploymentState::default(),
            &entries,
            &HardwareProfiles::default(),
        );
        assert_eq!(forecasts.len(), 3);
        assert_eq!(forecasts[0].status, ForecastStatus::Current);
        assert_eq!(forecasts[1].status, ForecastStatus::Current);
        assert_eq!(forecasts[2].status, ForecastStatus::NotInstalled);
        assert!(state.gateway.last_anchor.is_some());
        assert!(state.satellite_a.last_anchor.is_some());
        // satellites draw far less than the gateway
        assert!(
            forecasts[1].budget.as_ref().unwrap().daily_total_mah
                < forecasts[0].budget.as_ref().unwrap().daily_total_mah
        );
    }
}
