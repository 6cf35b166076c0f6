//! Driver configuration
//!
//! Transport selection plus the device roster, deserialized from TOML.

use rangecan_core::{DriverError, RangingMode, RegionOfInterest, TimingBudget};
use serde::{Deserialize, Serialize};

/// Top-level configuration for one bus session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Transport to open.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Sensors expected on this bus.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    /// Polling cadence for `poll_incoming`, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Cadence for logging device status, in milliseconds.
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
    /// Age past which a measurement is reported as stale.
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            devices: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
            report_interval_ms: default_report_interval_ms(),
            stale_after_ms: default_stale_after_ms(),
        }
    }
}

impl BusConfig {
    /// Parse a TOML document. Out-of-range values (unknown ranging mode or
    /// timing budget strings included) are rejected here, before anything
    /// touches the bus.
    pub fn from_toml(content: &str) -> Result<Self, DriverError> {
        toml::from_str(content).map_err(|e| DriverError::InvalidConfiguration(e.to_string()))
    }
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_report_interval_ms() -> u64 {
    1000
}

fn default_stale_after_ms() -> u64 {
    500
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// SocketCAN interface (Linux only)
    SocketCan(SocketCanConfig),
    /// Mock transport for tests and demo runs
    Mock(MockConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Mock(MockConfig::default())
    }
}

/// SocketCAN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketCanConfig {
    /// CAN interface name (e.g., "can0")
    pub interface: String,
    /// Bitrate the interface is expected to run at. Informational: the
    /// interface must already be configured and up.
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
}

fn default_bitrate() -> u32 {
    500000
}

/// Mock transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    /// Simulated send latency in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
    /// Acknowledge configuration requests the way a live sensor would
    #[serde(default = "default_true")]
    pub auto_ack: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            latency_ms: 0,
            auto_ack: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One sensor on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// CAN ID, unique on the bus. Mapping two sensors to one ID is a wiring
    /// error this driver cannot detect.
    pub can_id: u8,
    /// Optional human-readable name for logs.
    #[serde(default)]
    pub name: Option<String>,
    /// Ranging mode pushed at startup.
    #[serde(default)]
    pub ranging_mode: Option<RangingMode>,
    /// Timing budget pushed at startup.
    #[serde(default)]
    pub timing_budget: Option<TimingBudget>,
    /// Region of interest pushed at startup.
    #[serde(default)]
    pub roi: Option<RegionOfInterest>,
}

impl DeviceConfig {
    /// Display label: configured name, or one derived from the CAN ID.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("sensor-{}", self.can_id))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn full_config_parses() {
        let config = BusConfig::from_toml(
            r#"
            poll_interval_ms = 20
            stale_after_ms = 250

            [transport]
            type = "socketcan"
            interface = "can0"

            [[devices]]
            can_id = 5
            name = "intake"
            ranging_mode = "short"
            timing_budget = "33ms"
            roi = { x = 8, y = 8, w = 16, h = 16 }

            [[devices]]
            can_id = 6
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval_ms, 20);
        assert_eq!(config.report_interval_ms, 1000);
        assert!(matches!(
            config.transport,
            TransportConfig::SocketCan(SocketCanConfig { ref interface, bitrate: 500000 })
                if interface == "can0"
        ));

        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].ranging_mode, Some(RangingMode::Short));
        assert_eq!(config.devices[0].timing_budget, Some(TimingBudget::Tb33ms));
        assert_eq!(config.devices[1].label(), "sensor-6");
        assert_eq!(config.devices[1].timing_budget, None);
    }

    #[test]
    fn defaults_to_mock_transport() {
        let config = BusConfig::from_toml("").unwrap();
        assert!(matches!(config.transport, TransportConfig::Mock(_)));
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.stale_after_ms, 500);
    }

    #[test]
    fn unknown_timing_budget_value_is_rejected() {
        let err = BusConfig::from_toml(
            r#"
            [[devices]]
            can_id = 5
            timing_budget = "45ms"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::InvalidConfiguration(_)));
    }

    #[test]
    fn unknown_ranging_mode_value_is_rejected() {
        assert!(BusConfig::from_toml(
            r#"
            [[devices]]
            can_id = 5
            ranging_mode = "medium"
            "#,
        )
        .is_err());
    }
}
