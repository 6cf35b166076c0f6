//! Transport layer errors

use rangecan_core::DriverError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Payload of {len} bytes exceeds the {max}-byte CAN frame limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport not supported: {0}")]
    Unsupported(String),
}

impl From<TransportError> for DriverError {
    fn from(err: TransportError) -> Self {
        DriverError::Transport(err.to_string())
    }
}
