//! SocketCAN adapter over raw CAN frames

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame, Socket};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::SocketCanConfig;
use crate::transport::{BusFrame, CanTransport, IncomingFrame, TransportError};

/// Transport over a Linux SocketCAN interface.
///
/// The interface must already be up at the configured bitrate (e.g. via
/// `ip link set can0 up type can bitrate 500000`).
pub struct SocketCanTransport {
    socket: Arc<Mutex<CanSocket>>,
    connected: Arc<AtomicBool>,
    incoming_tx: broadcast::Sender<IncomingFrame>,
    listener_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SocketCanTransport {
    pub fn open(config: &SocketCanConfig) -> Result<Self, TransportError> {
        let socket = CanSocket::open(&config.interface).map_err(|e| {
            TransportError::ConnectionFailed(format!(
                "Failed to open CAN interface {}: {}",
                config.interface, e
            ))
        })?;

        // Non-blocking so neither the listener loop nor drain ever stalls
        socket.set_nonblocking(true).map_err(|e| {
            TransportError::InvalidConfig(format!("Failed to set non-blocking: {}", e))
        })?;

        // Drain any stale frames left over from previous sessions/processes
        Self::drain_socket(&socket);

        let (incoming_tx, _) = broadcast::channel(1024);

        let transport = Self {
            socket: Arc::new(Mutex::new(socket)),
            connected: Arc::new(AtomicBool::new(true)),
            incoming_tx,
            listener_handle: Mutex::new(None),
        };

        transport.start_listener();

        Ok(transport)
    }

    fn drain_socket(socket: &CanSocket) {
        while let Ok(frame) = socket.read_frame() {
            tracing::debug!(
                arb_id = format!("0x{:08X}", frame.raw_id()),
                "drained stale frame from socket"
            );
        }
    }

    fn start_listener(&self) {
        let socket = self.socket.clone();
        let incoming_tx = self.incoming_tx.clone();
        let connected = self.connected.clone();

        let handle = tokio::task::spawn_blocking(move || {
            while connected.load(Ordering::SeqCst) {
                let result = socket.lock().read_frame();
                match result {
                    Ok(frame) => {
                        let msg = IncomingFrame {
                            timestamp: Instant::now(),
                            frame: BusFrame {
                                arb_id: frame.raw_id(),
                                data: frame.data().to_vec(),
                            },
                        };
                        if incoming_tx.send(msg).is_err() {
                            // No receivers right now; frames are not queued
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    Err(e) => {
                        tracing::error!(?e, "SocketCAN read error");
                        std::thread::sleep(Duration::from_millis(100));
                    }
                }
            }
            tracing::debug!("SocketCAN listener stopped");
        });

        *self.listener_handle.lock() = Some(handle);
    }
}

#[async_trait]
impl CanTransport for SocketCanTransport {
    async fn send(&self, frame: &BusFrame) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let id = ExtendedId::new(frame.arb_id).ok_or_else(|| {
            TransportError::SendFailed(format!("Invalid extended CAN ID: 0x{:X}", frame.arb_id))
        })?;
        let can_frame = CanFrame::new(id, &frame.data).ok_or_else(|| {
            TransportError::SendFailed(format!(
                "Payload too large for CAN frame: {} bytes",
                frame.data.len()
            ))
        })?;

        let socket = self.socket.clone();
        tokio::task::spawn_blocking(move || {
            socket
                .lock()
                .write_frame(&can_frame)
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
        .await
        .map_err(|e| TransportError::SendFailed(format!("Task join error: {}", e)))??;

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<IncomingFrame> {
        self.incoming_tx.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for SocketCanTransport {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
