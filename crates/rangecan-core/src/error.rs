//! Common error types for the rangecan driver stack

use thiserror::Error;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors surfaced to callers of the driver
///
/// None of these are fatal to the session: the worst case is a device with
/// stale or absent measurement data, which callers detect through absence or
/// timestamps rather than a thrown fault.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Bus unavailable or frame write failure. Not retried automatically;
    /// the caller owns the retry policy.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed incoming frame
    #[error("Decode error: {0}")]
    Decode(String),

    /// Caller-supplied value out of the allowed range. Rejected before any
    /// transmission; no state has changed.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
