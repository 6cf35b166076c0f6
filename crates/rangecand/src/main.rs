//! rangecand - Monitor daemon for CAN laser ranging sensors
//!
//! Opens a bus session, registers the configured sensors, pushes their
//! initial settings, then polls the bus and logs measurements on a fixed
//! tick.
//!
//! Usage:
//!   rangecand [config.toml]
//!
//! If no config file is provided, uses the mock transport with a single
//! demo sensor.

use std::time::{Duration, Instant};

use rangecan_core::RangingMode;
use rangecan_driver::{BusConfig, DeviceConfig, SensorBus};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parsed command-line arguments
struct Args {
    /// Bus config file (TOML)
    config_path: Option<String>,
}

fn parse_args() -> Args {
    let mut result = Args { config_path: None };

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            a if !a.starts_with('-') => {
                // Positional argument = config file
                result.config_path = Some(a.to_string());
            }
            _ => {
                tracing::warn!("Unknown argument: {}", arg);
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"rangecand - Monitor daemon for CAN laser ranging sensors

Usage: rangecand [config.toml]

Options:
  -h, --help    Print this help message

Example config:

  poll_interval_ms = 50
  report_interval_ms = 1000
  stale_after_ms = 500

  [transport]
  type = "socketcan"
  interface = "can0"

  [[devices]]
  can_id = 5
  name = "intake"
  ranging_mode = "short"
  timing_budget = "33ms"
  roi = {{ x = 8, y = 8, w = 16, h = 16 }}
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rangecand=info,rangecan_driver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting rangecand");

    let args = parse_args();

    let config = match args.config_path {
        Some(ref path) => {
            tracing::info!("Loading config from: {}", path);
            let content = std::fs::read_to_string(path)?;
            BusConfig::from_toml(&content)?
        }
        None => {
            tracing::info!("No config file provided, using mock transport");
            demo_config()
        }
    };

    let bus = SensorBus::open(&config.transport)?;

    for device in &config.devices {
        bus.register(device.can_id);
        apply_initial_settings(&bus, device).await;
    }
    tracing::info!(devices = config.devices.len(), "Bus session open");

    let stale_after = Duration::from_millis(config.stale_after_ms);
    let mut poll = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    let mut report = tokio::time::interval(Duration::from_millis(config.report_interval_ms));

    loop {
        tokio::select! {
            _ = poll.tick() => {
                bus.poll_incoming();
            }
            _ = report.tick() => {
                report_devices(&bus, &config.devices, stale_after);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Push any initial settings configured for a device. Failures are logged
/// and skipped; the sensor keeps whatever configuration it had.
async fn apply_initial_settings(bus: &SensorBus, device: &DeviceConfig) {
    if let Some(mode) = device.ranging_mode {
        if let Err(e) = bus.set_ranging_mode(device.can_id, mode).await {
            tracing::warn!(device = %device.label(), error = %e, "Failed to set ranging mode");
        }
    }
    if let Some(budget) = device.timing_budget {
        if let Err(e) = bus.set_timing_budget(device.can_id, budget).await {
            tracing::warn!(device = %device.label(), error = %e, "Failed to set timing budget");
        }
    }
    if let Some(roi) = device.roi {
        if let Err(e) = bus.set_roi(device.can_id, roi).await {
            tracing::warn!(device = %device.label(), error = %e, "Failed to set region of interest");
        }
    }
}

/// Log one status line per configured device. Staleness is judged here, not
/// in the driver: a reading past `stale_after` is reported as unusable even
/// though the registry still holds it.
fn report_devices(bus: &SensorBus, devices: &[DeviceConfig], stale_after: Duration) {
    let now = Instant::now();
    for device in devices {
        match bus.measurement(device.can_id) {
            Some(m) if m.age(now) > stale_after => {
                tracing::warn!(
                    device = %device.label(),
                    age_ms = m.age(now).as_millis() as u64,
                    "Measurement stale"
                );
            }
            Some(m) => match m.valid_distance_mm() {
                Some(distance_mm) => {
                    tracing::info!(
                        device = %device.label(),
                        distance_mm,
                        ambient = m.ambient,
                        budget = %m.budget,
                        "Range"
                    );
                }
                None => {
                    tracing::info!(
                        device = %device.label(),
                        status = %m.status,
                        "No valid range"
                    );
                }
            },
            None => {
                tracing::debug!(device = %device.label(), "No measurement yet");
            }
        }
    }
}

/// Built-in demo setup: mock transport, one sensor.
fn demo_config() -> BusConfig {
    BusConfig {
        devices: vec![DeviceConfig {
            can_id: 5,
            name: Some("demo".to_string()),
            ranging_mode: Some(RangingMode::Short),
            timing_budget: None,
            roi: None,
        }],
        ..Default::default()
    }
}
