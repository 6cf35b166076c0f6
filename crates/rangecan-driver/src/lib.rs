//! rangecan-driver - CAN bus driver core for laser ranging sensors
//!
//! One [`SensorBus`] per physical bus multiplexes any number of sensors by
//! CAN ID: it decodes their measurement broadcasts into the device registry
//! and transmits configuration changes with best-effort acknowledgement
//! tracking. Nothing here blocks on the network; `poll_incoming` drains
//! whatever arrived since the last call and returns.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                    SensorBus                     │
//! │                                                  │
//! │  ┌────────────────┐      ┌─────────────────────┐ │
//! │  │ DeviceRegistry │      │ wire (frame codec)  │ │
//! │  │ (per-ID state) │      │ (firmware contract) │ │
//! │  └────────────────┘      └─────────────────────┘ │
//! │                     │                            │
//! │            ┌────────┴────────┐                   │
//! │            │  CanTransport   │                   │
//! │            │ (SocketCAN/mock)│                   │
//! │            └─────────────────┘                   │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod registry;
pub mod session;
pub mod transport;
pub mod wire;

pub use config::{BusConfig, DeviceConfig, MockConfig, SocketCanConfig, TransportConfig};
pub use registry::{AppliedConfig, ConfigSetting, DeviceRegistry, PendingConfig};
pub use session::SensorBus;
pub use transport::{create_transport, BusFrame, CanTransport, IncomingFrame, TransportError};
pub use wire::{DecodeError, MessageKind};

// Re-export for convenience
pub use rangecan_core::{
    DriverError, DriverResult, Measurement, MeasurementStatus, RangingMode, RegionOfInterest,
    TimingBudget,
};
