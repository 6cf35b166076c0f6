//! Mock transport for tests and demo runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::{BusFrame, CanTransport, IncomingFrame, TransportError};
use crate::config::MockConfig;
use crate::wire::{self, MessageKind};

/// Mock transport: records outgoing frames, lets tests inject incoming
/// ones, and (optionally) acknowledges configuration requests the way a
/// live sensor would.
pub struct MockTransport {
    config: MockConfig,
    connected: AtomicBool,
    incoming_tx: broadcast::Sender<IncomingFrame>,
    /// Every frame handed to `send`, in order.
    sent: Mutex<Vec<BusFrame>>,
}

impl MockTransport {
    pub fn new(config: &MockConfig) -> Self {
        let (incoming_tx, _) = broadcast::channel(256);
        Self {
            config: config.clone(),
            connected: AtomicBool::new(true),
            incoming_tx,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Inject an incoming frame (simulates a sensor broadcasting on the bus).
    pub fn inject_incoming(&self, frame: BusFrame) {
        let msg = IncomingFrame {
            timestamp: Instant::now(),
            frame,
        };
        let _ = self.incoming_tx.send(msg);
    }

    /// Set connection state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Every frame handed to `send` so far, in order.
    pub fn sent_frames(&self) -> Vec<BusFrame> {
        self.sent.lock().clone()
    }

    /// Synthesize the acknowledgement a sensor would send back for a
    /// configuration request.
    fn auto_ack(&self, frame: &BusFrame) {
        let Ok((kind, can_id)) = wire::parse_arb_id(frame.arb_id) else {
            return;
        };
        if kind.is_config_request() {
            self.inject_incoming(BusFrame {
                arb_id: wire::arb_id(MessageKind::Ack, can_id),
                data: wire::encode_ack(kind, true).to_vec(),
            });
        }
    }
}

#[async_trait]
impl CanTransport for MockTransport {
    async fn send(&self, frame: &BusFrame) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        // Simulate latency
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        tracing::debug!(
            arb_id = format!("0x{:08X}", frame.arb_id),
            payload = %hex::encode(&frame.data),
            "mock transport: sent frame"
        );
        self.sent.lock().push(frame.clone());

        if self.config.auto_ack {
            self.auto_ack(frame);
        }

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<IncomingFrame> {
        self.incoming_tx.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
