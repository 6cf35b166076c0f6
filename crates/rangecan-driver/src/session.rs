//! Bus session: owns the transport, routes frames, applies configuration

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rangecan_core::{
    DriverError, DriverResult, Measurement, RangingMode, RegionOfInterest, TimingBudget,
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, trace, warn};

use crate::config::TransportConfig;
use crate::registry::{AppliedConfig, ConfigSetting, DeviceRegistry, PendingConfig};
use crate::transport::{create_transport, BusFrame, CanTransport, IncomingFrame, TransportError};
use crate::wire::{self, MessageKind};

/// A session on one physical CAN bus.
///
/// Owns the transport handle and multiplexes any number of sensors over it.
/// `poll_incoming` must be called periodically (it never blocks); every
/// other call returns as soon as its work is handed to the transport.
/// Configuration writes are fire-and-track: success means accepted for
/// transmission, and [`SensorBus::pending_configs`] shows what the device
/// has not yet acknowledged.
pub struct SensorBus {
    transport: Arc<dyn CanTransport>,
    registry: DeviceRegistry,
    incoming: Mutex<broadcast::Receiver<IncomingFrame>>,
    decode_errors: AtomicU64,
}

impl SensorBus {
    /// Open a session over the transport described by `config`.
    pub fn open(config: &TransportConfig) -> DriverResult<Self> {
        Ok(Self::with_transport(create_transport(config)?))
    }

    /// Build a session over an already-constructed transport.
    pub fn with_transport(transport: Arc<dyn CanTransport>) -> Self {
        let incoming = Mutex::new(transport.subscribe());
        Self {
            transport,
            registry: DeviceRegistry::new(),
            incoming,
            decode_errors: AtomicU64::new(0),
        }
    }

    /// Register a sensor by CAN ID. Idempotent. Sensors that broadcast
    /// before being registered are picked up implicitly when their first
    /// frame arrives.
    pub fn register(&self, can_id: u8) {
        self.registry.register(can_id);
    }

    /// CAN IDs known to this session, sorted.
    pub fn devices(&self) -> Vec<u8> {
        self.registry.ids()
    }

    /// Drain every frame received since the last poll and fold it into the
    /// registry. Never blocks; returns the number of sensor frames applied.
    /// Malformed frames are discarded and show up in
    /// [`SensorBus::decode_error_count`] instead.
    pub fn poll_incoming(&self) -> usize {
        let mut rx = self.incoming.lock();
        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(incoming) => applied += self.dispatch(incoming),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "incoming frame buffer lagged, frames dropped");
                }
            }
        }
        applied
    }

    fn dispatch(&self, incoming: IncomingFrame) -> usize {
        let IncomingFrame { timestamp, frame } = incoming;
        if !wire::is_sensor_frame(frame.arb_id) {
            trace!(
                arb_id = format!("0x{:08X}", frame.arb_id),
                "ignoring non-sensor frame"
            );
            return 0;
        }

        // Any sensor-class frame counts as bus activity, decodable or not.
        let can_id = wire::device_id(frame.arb_id);
        self.registry.touch(can_id, timestamp);

        let kind = match wire::parse_arb_id(frame.arb_id) {
            Ok((kind, _)) => kind,
            Err(err) => return self.decode_failure(can_id, &frame, err),
        };

        match kind {
            MessageKind::Measurement => {
                match wire::decode_measurement(&frame.data, timestamp) {
                    Ok(measurement) => {
                        debug!(
                            can_id,
                            payload = %hex::encode(&frame.data),
                            status = %measurement.status,
                            "measurement frame"
                        );
                        self.registry.record_measurement(can_id, measurement);
                        1
                    }
                    Err(err) => self.decode_failure(can_id, &frame, err),
                }
            }
            MessageKind::Ack => match wire::decode_ack(&frame.data) {
                Ok(ack) => {
                    match self.registry.acknowledge(can_id, ack.kind, ack.accepted) {
                        Some(setting) if ack.accepted => {
                            debug!(can_id, ?setting, "configuration acknowledged");
                        }
                        Some(setting) => {
                            warn!(can_id, ?setting, "configuration rejected by device");
                        }
                        None => {
                            trace!(can_id, kind = ?ack.kind, "acknowledgement with nothing pending");
                        }
                    }
                    1
                }
                Err(err) => self.decode_failure(can_id, &frame, err),
            },
            // Host-to-device kinds looping back mean another host shares the
            // bus; activity was recorded above, nothing else to do.
            MessageKind::SetRangingMode | MessageKind::SetTimingBudget | MessageKind::SetRoi => {
                trace!(can_id, ?kind, "ignoring frame from another host");
                0
            }
        }
    }

    fn decode_failure(&self, can_id: u8, frame: &BusFrame, err: wire::DecodeError) -> usize {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
        warn!(
            can_id,
            payload = %hex::encode(&frame.data),
            error = %err,
            "discarding undecodable frame"
        );
        0
    }

    /// Count of malformed frames discarded since the session opened.
    pub fn decode_error_count(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Latest measurement for `can_id`; `None` until its first frame arrives.
    pub fn measurement(&self, can_id: u8) -> Option<Measurement> {
        self.registry.measurement(can_id)
    }

    /// Instant of the last frame seen from `can_id`, if any.
    pub fn last_seen(&self, can_id: u8) -> Option<Instant> {
        self.registry.last_seen(can_id)
    }

    /// Configuration writes the device has not yet acknowledged.
    pub fn pending_configs(&self, can_id: u8) -> Vec<PendingConfig> {
        self.registry.pending(can_id)
    }

    /// Last-known device configuration.
    pub fn applied_config(&self, can_id: u8) -> AppliedConfig {
        self.registry.applied(can_id)
    }

    /// Whether the underlying transport is currently usable.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Hand a raw payload to the transport, addressed to `can_id`. Fails
    /// before the transport is touched if the payload exceeds the CAN frame
    /// limit.
    pub async fn send(&self, can_id: u8, kind: MessageKind, payload: &[u8]) -> DriverResult<()> {
        if payload.len() > wire::MAX_PAYLOAD {
            return Err(TransportError::PayloadTooLarge {
                len: payload.len(),
                max: wire::MAX_PAYLOAD,
            }
            .into());
        }
        let frame = BusFrame {
            arb_id: wire::arb_id(kind, can_id),
            data: payload.to_vec(),
        };
        self.transport.send(&frame).await.map_err(DriverError::from)
    }

    /// Switch the sensor's ranging mode.
    pub async fn set_ranging_mode(&self, can_id: u8, mode: RangingMode) -> DriverResult<()> {
        self.apply(
            can_id,
            ConfigSetting::RangingMode(mode),
            wire::encode_ranging_mode(mode),
        )
        .await
    }

    /// Switch the sensor's timing budget.
    pub async fn set_timing_budget(&self, can_id: u8, budget: TimingBudget) -> DriverResult<()> {
        self.apply(
            can_id,
            ConfigSetting::TimingBudget(budget),
            wire::encode_timing_budget(budget),
        )
        .await
    }

    /// Move the sensor's region of interest. The window is checked against
    /// the sensor's field before anything is transmitted.
    pub async fn set_roi(&self, can_id: u8, roi: RegionOfInterest) -> DriverResult<()> {
        roi.validate()?;
        self.apply(can_id, ConfigSetting::Roi(roi), wire::encode_roi(&roi))
            .await
    }

    async fn apply(
        &self,
        can_id: u8,
        setting: ConfigSetting,
        payload: Vec<u8>,
    ) -> DriverResult<()> {
        self.send(can_id, setting.kind(), &payload).await?;
        self.registry.mark_pending(can_id, setting, Instant::now());
        debug!(can_id, ?setting, "configuration sent");
        Ok(())
    }
}
