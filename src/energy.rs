//! # Daily Energy Estimation
//!
//! Turns a [`DeviceConfig`] and a hardware profile into an [`EnergyBudget`]: how many
//! milliamp-hours one node draws per day, broken down by activity.
//!
//! ## Gateway
//! The gateway runs three schedules side by side:
//! - **Local sampling**: `floor(86400 / sample_period)` wakes a day
//! - **Peer sync**: `floor(86400 / peer_sync_period)` events a day, only when at least one
//!   satellite is installed; each pays an early-wake penalty plus one listen window per
//!   installed satellite
//! - **Bulk upload**: `24 / frequency_h` uploads a day (fractional), each carrying
//!   `max(1, floor(frequency_h * 3600 / interval))` rows. Cellular uploads are a
//!   boot + attach + transmit + shutdown sum capped at the firmware block limit; WiFi
//!   uploads are a connect plus per-row transmit.
//!
//! Whatever is left of the day is spent in deep sleep, or idling awake when sleep is
//! disabled.
//!
//! ## Satellite
//! Satellites wake to sample and wake to sync. When both periods are the same (within a
//! millisecond) the firmware folds them into one wake; otherwise the two schedules run
//! independently. The sync listen window is averaged over the "every Nth wake listens
//! longer" resync ladder.

use serde::{Deserialize, Serialize};

use crate::device_config::{DeployMode, DeviceConfig};
use crate::hardware::{GatewayProfile, SatelliteProfile};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Periods closer than this are treated as the same schedule.
const MERGE_TOLERANCE_S: f64 = 0.001;

/// Energy drawn by one activity over a day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnergyComponent {
    pub name: String,
    pub seconds_per_day: f64,
    pub current_ma: f64,
    pub milliamp_hours: f64,
}

impl EnergyComponent {
    fn new(name: &str, seconds_per_day: f64, current_ma: f64) -> Self {
        EnergyComponent {
            name: name.to_string(),
            seconds_per_day,
            current_ma,
            milliamp_hours: current_ma * seconds_per_day / 3600.0,
        }
    }
}

/// Daily consumption for one configuration on one board class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnergyBudget {
    pub daily_total_mah: f64,
    pub usable_capacity_mah: f64,
    pub breakdown: Vec<EnergyComponent>,
}

impl EnergyBudget {
    fn from_components(breakdown: Vec<EnergyComponent>, usable_capacity_mah: f64) -> Self {
        let daily_total_mah = breakdown.iter().map(|c| c.milliamp_hours).sum();
        EnergyBudget {
            daily_total_mah,
            usable_capacity_mah,
            breakdown,
        }
    }

    /// Days a full (derated) battery lasts, `None` when nothing is drawn.
    pub fn lifetime_days(&self) -> Option<f64> {
        if self.daily_total_mah > 0.0 {
            Some(self.usable_capacity_mah / self.daily_total_mah)
        } else {
            None
        }
    }

    /// Seconds per day spent awake, i.e. everything except the sleep component.
    pub fn active_seconds(&self) -> f64 {
        self.breakdown
            .iter()
            .filter(|c| c.name != SLEEP)
            .map(|c| c.seconds_per_day)
            .sum()
    }
}

const SLEEP: &str = "sleep";

/// A board whose daily draw can be derived from the operating configuration.
pub trait EnergyModel {
    fn daily_budget(&self, config: &DeviceConfig) -> EnergyBudget;
}

/// Estimate a day's consumption for `config` on `profile`.
pub fn estimate_daily_consumption<M: EnergyModel + ?Sized>(
    config: &DeviceConfig,
    profile: &M,
) -> EnergyBudget {
    profile.daily_budget(config)
}

fn per_day(period_s: u32) -> f64 {
    (SECONDS_PER_DAY / f64::from(period_s.max(1))).floor()
}

fn sleep_component(active_s: f64, current_ma: f64) -> EnergyComponent {
    EnergyComponent::new(SLEEP, (SECONDS_PER_DAY - active_s).max(0.0), current_ma)
}

impl GatewayProfile {
    /// Duration of one bulk upload carrying `rows` rows.
    pub fn upload_duration_s(&self, mode: DeployMode, rows: f64) -> f64 {
        match mode {
            DeployMode::Cellular => (self.modem_boot_s
                + self.network_attach_s
                + rows * self.cellular_row_tx_s
                + self.modem_shutdown_s)
                .min(self.cellular_max_block_s),
            DeployMode::Wifi => self.wifi_connect_s + rows * self.wifi_row_tx_s,
        }
    }
}

impl EnergyModel for GatewayProfile {
    fn daily_budget(&self, config: &DeviceConfig) -> EnergyBudget {
        let samples = per_day(config.sample_period_s);
        let satellites = f64::from(config.installed_satellites());
        let syncs = if satellites > 0.0 {
            per_day(config.peer_sync_period_s)
        } else {
            0.0
        };
        let uploads = 24.0 / config.bulk_upload_frequency_h;
        let rows = (config.bulk_upload_frequency_h * 3600.0
            / f64::from(config.bulk_upload_interval_s.max(1)))
        .floor()
        .max(1.0);

        let upload_current = match config.deploy_mode {
            DeployMode::Cellular => self.cellular_current_ma,
            DeployMode::Wifi => self.wifi_current_ma,
        };

        let mut breakdown = vec![
            EnergyComponent::new(
                "sampling",
                samples * self.sample_wake_s,
                self.sample_current_ma,
            ),
            EnergyComponent::new(
                "sync early wake",
                syncs * self.sync_early_wake_s,
                self.radio_rx_current_ma,
            ),
            EnergyComponent::new(
                "sync listen",
                syncs * self.sync_window_per_satellite_s * satellites,
                self.radio_rx_current_ma,
            ),
            EnergyComponent::new(
                "upload",
                uploads * self.upload_duration_s(config.deploy_mode, rows),
                upload_current,
            ),
        ];

        let active_s: f64 = breakdown.iter().map(|c| c.seconds_per_day).sum();
        let rest_current = if config.sleep_enabled {
            self.deep_sleep_current_ma
        } else {
            self.active_idle_current_ma
        };
        breakdown.push(sleep_component(active_s, rest_current));

        EnergyBudget::from_components(breakdown, self.usable_capacity_mah())
    }
}

impl EnergyModel for SatelliteProfile {
    fn daily_budget(&self, config: &DeviceConfig) -> EnergyBudget {
        let samples = per_day(config.sample_period_s);
        let syncs = per_day(config.peer_sync_period_s);
        let merged = (f64::from(config.sample_period_s) - f64::from(config.peer_sync_period_s))
            .abs()
            < MERGE_TOLERANCE_S;

        let tx_s = self.tx_frames_per_wake() * self.tx_frame_ms / 1000.0;
        let listen_s = self.average_listen_s();
        let flash_s = self.flash_write_ms / 1000.0;

        // Merged: every wake samples, forwards and listens. Split: sample wakes read
        // and log, sync wakes forward and listen.
        let (boots, reads, exchanges) = if merged {
            (samples, samples, samples)
        } else {
            (samples + syncs, samples, syncs)
        };

        let mut breakdown = vec![
            EnergyComponent::new("boot", boots * self.boot_s, self.boot_current_ma),
            EnergyComponent::new(
                "sensor read",
                reads * self.sensor_read_s,
                self.sensor_current_ma,
            ),
            EnergyComponent::new("radio tx", exchanges * tx_s, self.tx_current_ma),
            EnergyComponent::new("radio rx", exchanges * listen_s, self.rx_current_ma),
            EnergyComponent::new("flash write", reads * flash_s, self.flash_current_ma),
        ];

        let active_s: f64 = breakdown.iter().map(|c| c.seconds_per_day).sum();
        let rest_current = if config.sleep_enabled {
            self.deep_sleep_current_ua / 1000.0
        } else {
            self.boot_current_ma
        };
        breakdown.push(sleep_component(active_s, rest_current));

        EnergyBudget::from_components(breakdown, self.usable_capacity_mah())
    }
}
