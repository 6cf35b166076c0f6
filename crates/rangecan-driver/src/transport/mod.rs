//! Transport layer: pluggable CAN bus access
//!
//! This module provides the transports a [`crate::session::SensorBus`] can
//! run over:
//! - SocketCAN adapter for real hardware (Linux only)
//! - Mock adapter for tests and demo runs

mod adapter;
pub mod error;
pub mod mock;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use adapter::{BusFrame, CanTransport, IncomingFrame};
pub use error::TransportError;

use std::sync::Arc;

use crate::config::TransportConfig;

/// Create a transport from configuration.
pub fn create_transport(config: &TransportConfig) -> Result<Arc<dyn CanTransport>, TransportError> {
    match config {
        #[cfg(all(target_os = "linux", feature = "socketcan"))]
        TransportConfig::SocketCan(cfg) => {
            let transport = socketcan::SocketCanTransport::open(cfg)?;
            Ok(Arc::new(transport))
        }
        #[cfg(not(all(target_os = "linux", feature = "socketcan")))]
        TransportConfig::SocketCan(_) => Err(TransportError::Unsupported(
            "SocketCAN requires Linux and the 'socketcan' feature".to_string(),
        )),
        TransportConfig::Mock(cfg) => {
            let transport = mock::MockTransport::new(cfg);
            Ok(Arc::new(transport))
        }
    }
}
