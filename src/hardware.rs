//! # Hardware Current-Draw Profiles
//!
//! Bench-measured current draws and phase durations for the two board classes in the
//! deployment. The defaults describe the boards as built; any field can be overridden
//! from `[hardware.gateway]` / `[hardware.satellite]` in the config file to explore
//! "what if" scenarios (bigger battery, slower modem attach, more TX retries).
//!
//! Units are in the field names: `_ma` milliamps, `_ua` microamps, `_s` seconds,
//! `_ms` milliseconds, `_mah` milliamp-hours.

use serde::{Deserialize, Serialize};

/// Gateway ("T0") board: sensor front end, peer radio and a WiFi or cellular uplink.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayProfile {
    /// Awake time per local sensor sample
    pub sample_wake_s: f64,
    pub sample_current_ma: f64,

    /// Extra awake time before each peer sync so the radio is listening when the
    /// satellites' clocks run early
    pub sync_early_wake_s: f64,
    /// Listen window per installed satellite per sync
    pub sync_window_per_satellite_s: f64,
    pub radio_rx_current_ma: f64,

    /// Cellular upload phases: modem power-up, network attach, per-row transmit, detach
    pub modem_boot_s: f64,
    pub network_attach_s: f64,
    pub cellular_row_tx_s: f64,
    pub modem_shutdown_s: f64,
    /// Firmware watchdog limit on one cellular upload block
    pub cellular_max_block_s: f64,
    pub cellular_current_ma: f64,

    /// WiFi upload: association plus per-row transmit
    pub wifi_connect_s: f64,
    pub wifi_row_tx_s: f64,
    pub wifi_current_ma: f64,

    pub deep_sleep_current_ma: f64,
    /// Draw while awake but idle, used for the whole remainder of the day when sleep
    /// is disabled
    pub active_idle_current_ma: f64,

    pub battery_capacity_mah: f64,
    /// Usable fraction of the nameplate capacity
    pub derating: f64,
}

impl Default for GatewayProfile {
    fn default() -> Self {
        GatewayProfile {
            sample_wake_s: 2.5,
            sample_current_ma: 48.0,
            sync_early_wake_s: 2.0,
            sync_window_per_satellite_s: 3.0,
            radio_rx_current_ma: 62.0,
            modem_boot_s: 6.0,
            network_attach_s: 25.0,
            cellular_row_tx_s: 0.35,
            modem_shutdown_s: 4.0,
            cellular_max_block_s: 180.0,
            cellular_current_ma: 135.0,
            wifi_connect_s: 4.5,
            wifi_row_tx_s: 0.05,
            wifi_current_ma: 115.0,
            deep_sleep_current_ma: 0.12,
            active_idle_current_ma: 42.0,
            battery_capacity_mah: 3000.0,
            derating: 0.85,
        }
    }
}

impl GatewayProfile {
    pub fn usable_capacity_mah(&self) -> f64 {
        self.battery_capacity_mah * self.derating
    }
}

/// Satellite board: wakes to sample, forwards readings to the gateway and listens for
/// the gateway's sync beacon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SatelliteProfile {
    pub boot_s: f64,
    pub boot_current_ma: f64,

    pub sensor_read_s: f64,
    pub sensor_current_ma: f64,

    /// Air time of one radio frame
    pub tx_frame_ms: f64,
    pub tx_current_ma: f64,
    pub tx_retries: u32,

    pub rx_listen_s: f64,
    /// Long listen used for a full resync
    pub rx_listen_extended_s: f64,
    /// Every Nth wake uses the extended listen window
    pub extended_listen_every_n: u32,
    pub rx_current_ma: f64,

    pub flash_write_ms: f64,
    pub flash_current_ma: f64,

    pub deep_sleep_current_ua: f64,

    pub battery_capacity_mah: f64,
    pub derating: f64,
}

impl Default for SatelliteProfile {
    fn default() -> Self {
        SatelliteProfile {
            boot_s: 0.35,
            boot_current_ma: 38.0,
            sensor_read_s: 0.9,
            sensor_current_ma: 24.0,
            tx_frame_ms: 45.0,
            tx_current_ma: 128.0,
            tx_retries: 2,
            rx_listen_s: 1.2,
            rx_listen_extended_s: 12.0,
            extended_listen_every_n: 12,
            rx_current_ma: 46.0,
            flash_write_ms: 25.0,
            flash_current_ma: 31.0,
            deep_sleep_current_ua: 11.0,
            battery_capacity_mah: 2600.0,
            derating: 0.85,
        }
    }
}

impl SatelliteProfile {
    pub fn usable_capacity_mah(&self) -> f64 {
        self.battery_capacity_mah * self.derating
    }

    /// Frames sent per wake: one data frame plus its acknowledgement slot, repeated
    /// for each retry.
    pub fn tx_frames_per_wake(&self) -> f64 {
        2.0 * (1.0 + f64::from(self.tx_retries))
    }

    /// Mean listen window when every Nth wake listens for the extended duration.
    pub fn average_listen_s(&self) -> f64 {
        let n = f64::from(self.extended_listen_every_n.max(1));
        let extended_weight = 1.0 / n;
        self.rx_listen_extended_s * extended_weight + self.rx_listen_s * (1.0 - extended_weight)
    }
}

/// Both profiles, as loaded from configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareProfiles {
    pub gateway: GatewayProfile,
    pub satellite: SatelliteProfile,
}
