//! Transport trait and frame types

use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::TransportError;

/// A classic CAN frame as the driver sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusFrame {
    /// 29-bit extended arbitration identifier.
    pub arb_id: u32,
    /// Payload, at most 8 bytes.
    pub data: Vec<u8>,
}

/// Incoming frame plus its receive timestamp.
#[derive(Debug, Clone)]
pub struct IncomingFrame {
    pub timestamp: Instant,
    pub frame: BusFrame,
}

/// Bus-agnostic CAN access.
///
/// Implementations serialize hardware access internally. `send` returns once
/// the frame is handed to the bus driver; incoming traffic fans out through
/// a broadcast channel, so receivers only see frames that arrive after they
/// subscribe.
#[async_trait]
pub trait CanTransport: Send + Sync {
    /// Hand one frame to the bus for transmission.
    async fn send(&self, frame: &BusFrame) -> Result<(), TransportError>;

    /// Subscribe to incoming frames.
    fn subscribe(&self) -> broadcast::Receiver<IncomingFrame>;

    /// Whether the underlying bus handle is currently usable.
    fn is_connected(&self) -> bool;
}
