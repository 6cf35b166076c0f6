//! Per-device state tracking keyed by CAN ID

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;
use rangecan_core::{Measurement, RangingMode, RegionOfInterest, TimingBudget};

use crate::wire::MessageKind;

/// One configuration value, in flight or applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigSetting {
    RangingMode(RangingMode),
    TimingBudget(TimingBudget),
    Roi(RegionOfInterest),
}

impl ConfigSetting {
    /// Message kind used to transmit (and acknowledge) this setting.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::RangingMode(_) => MessageKind::SetRangingMode,
            Self::TimingBudget(_) => MessageKind::SetTimingBudget,
            Self::Roi(_) => MessageKind::SetRoi,
        }
    }
}

/// Last configuration the device is known to run with. `None` fields have
/// never been confirmed in either direction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AppliedConfig {
    pub mode: Option<RangingMode>,
    pub budget: Option<TimingBudget>,
    pub roi: Option<RegionOfInterest>,
}

impl AppliedConfig {
    fn apply(&mut self, setting: ConfigSetting) {
        match setting {
            ConfigSetting::RangingMode(mode) => self.mode = Some(mode),
            ConfigSetting::TimingBudget(budget) => self.budget = Some(budget),
            ConfigSetting::Roi(roi) => self.roi = Some(roi),
        }
    }
}

/// A configuration write accepted for transmission but not yet acknowledged.
///
/// Entries persist until a matching acknowledgement arrives; no timeout is
/// enforced at this layer. Callers that care can compare `sent_at` against
/// the clock and re-apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingConfig {
    pub setting: ConfigSetting,
    pub sent_at: Instant,
}

#[derive(Debug, Default)]
struct DeviceState {
    measurement: Option<Measurement>,
    last_seen: Option<Instant>,
    applied: AppliedConfig,
    pending: Vec<PendingConfig>,
}

/// Registry of per-CAN-ID device state.
///
/// One coarse lock guards the map: a bus carries tens of devices at most,
/// and the bus, not this lock, limits throughput. Entries are created on
/// first access and live for the owning session's lifetime.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<u8, DeviceState>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure an entry exists for `can_id`. Idempotent.
    pub fn register(&self, can_id: u8) {
        self.devices.write().entry(can_id).or_default();
    }

    pub fn contains(&self, can_id: u8) -> bool {
        self.devices.read().contains_key(&can_id)
    }

    /// Registered CAN IDs, sorted.
    pub fn ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.devices.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Overwrite the stored measurement; only the latest value is retained.
    ///
    /// The mode/budget echo in the frame corrects the applied view: the
    /// device's own report wins over whatever was last sent to it.
    pub fn record_measurement(&self, can_id: u8, measurement: Measurement) {
        let mut devices = self.devices.write();
        let state = devices.entry(can_id).or_default();
        state.last_seen = Some(measurement.timestamp);
        state.applied.mode = Some(measurement.mode);
        state.applied.budget = Some(measurement.budget);
        state.measurement = Some(measurement);
    }

    /// Latest measurement, or `None` if the device has never reported one.
    pub fn measurement(&self, can_id: u8) -> Option<Measurement> {
        self.devices.read().get(&can_id).and_then(|s| s.measurement)
    }

    /// Refresh bus activity for `can_id` without touching measurement state.
    pub fn touch(&self, can_id: u8, at: Instant) {
        self.devices.write().entry(can_id).or_default().last_seen = Some(at);
    }

    /// Instant of the last frame seen from `can_id`, if any.
    pub fn last_seen(&self, can_id: u8) -> Option<Instant> {
        self.devices.read().get(&can_id).and_then(|s| s.last_seen)
    }

    /// Record a configuration write awaiting acknowledgement. A second write
    /// of the same kind replaces the first; only the newest is tracked.
    pub fn mark_pending(&self, can_id: u8, setting: ConfigSetting, sent_at: Instant) {
        let mut devices = self.devices.write();
        let state = devices.entry(can_id).or_default();
        state.pending.retain(|p| p.setting.kind() != setting.kind());
        state.pending.push(PendingConfig { setting, sent_at });
    }

    /// Clear the pending entry matching an acknowledgement and return the
    /// setting it carried, if one was in flight. Accepted settings are
    /// promoted to the applied view; rejected ones are discarded.
    pub fn acknowledge(
        &self,
        can_id: u8,
        kind: MessageKind,
        accepted: bool,
    ) -> Option<ConfigSetting> {
        let mut devices = self.devices.write();
        let state = devices.get_mut(&can_id)?;
        let index = state.pending.iter().position(|p| p.setting.kind() == kind)?;
        let entry = state.pending.remove(index);
        if accepted {
            state.applied.apply(entry.setting);
        }
        Some(entry.setting)
    }

    /// Configuration writes still awaiting acknowledgement.
    pub fn pending(&self, can_id: u8) -> Vec<PendingConfig> {
        self.devices
            .read()
            .get(&can_id)
            .map(|s| s.pending.clone())
            .unwrap_or_default()
    }

    /// Last-known device configuration.
    pub fn applied(&self, can_id: u8) -> AppliedConfig {
        self.devices
            .read()
            .get(&can_id)
            .map(|s| s.applied)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use rangecan_core::MeasurementStatus;

    use super::*;

    fn measurement(distance_mm: u16) -> Measurement {
        Measurement {
            status: MeasurementStatus::Valid,
            distance_mm,
            ambient: 0,
            mode: RangingMode::Short,
            budget: TimingBudget::Tb33ms,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn measurement_is_absent_until_recorded() {
        let registry = DeviceRegistry::new();
        registry.register(5);
        assert_eq!(registry.measurement(5), None);
    }

    #[test]
    fn record_overwrites_without_history() {
        let registry = DeviceRegistry::new();
        registry.record_measurement(5, measurement(1500));
        registry.record_measurement(5, measurement(1600));
        assert_eq!(registry.measurement(5).unwrap().distance_mm, 1600);
    }

    #[test]
    fn recording_registers_the_device() {
        let registry = DeviceRegistry::new();
        registry.record_measurement(9, measurement(100));
        assert!(registry.contains(9));
        assert_eq!(registry.ids(), vec![9]);
    }

    #[test]
    fn accepted_ack_promotes_pending_to_applied() {
        let registry = DeviceRegistry::new();
        let setting = ConfigSetting::TimingBudget(TimingBudget::Tb100ms);
        registry.mark_pending(5, setting, Instant::now());
        assert_eq!(registry.pending(5).len(), 1);

        let acked = registry.acknowledge(5, MessageKind::SetTimingBudget, true);
        assert_eq!(acked, Some(setting));
        assert!(registry.pending(5).is_empty());
        assert_eq!(registry.applied(5).budget, Some(TimingBudget::Tb100ms));
    }

    #[test]
    fn rejected_ack_clears_pending_without_applying() {
        let registry = DeviceRegistry::new();
        registry.mark_pending(
            5,
            ConfigSetting::RangingMode(RangingMode::Long),
            Instant::now(),
        );

        registry.acknowledge(5, MessageKind::SetRangingMode, false);
        assert!(registry.pending(5).is_empty());
        assert_eq!(registry.applied(5).mode, None);
    }

    #[test]
    fn newer_write_of_the_same_kind_replaces_the_pending_entry() {
        let registry = DeviceRegistry::new();
        registry.mark_pending(
            5,
            ConfigSetting::TimingBudget(TimingBudget::Tb20ms),
            Instant::now(),
        );
        registry.mark_pending(
            5,
            ConfigSetting::TimingBudget(TimingBudget::Tb50ms),
            Instant::now(),
        );

        let pending = registry.pending(5);
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].setting,
            ConfigSetting::TimingBudget(TimingBudget::Tb50ms)
        );
    }

    #[test]
    fn ack_with_nothing_pending_is_a_no_op() {
        let registry = DeviceRegistry::new();
        registry.register(5);
        assert_eq!(registry.acknowledge(5, MessageKind::SetRoi, true), None);
        assert_eq!(registry.applied(5).roi, None);
    }
}
