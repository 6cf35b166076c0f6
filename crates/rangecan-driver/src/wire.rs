//! Wire protocol for LaserCAN-class distance sensors.
//!
//! Everything in this module is the device firmware's contract: fixed byte
//! positions, little-endian integers, and 29-bit extended arbitration IDs
//! packing device class, manufacturer, message kind, and device CAN ID.
//! Nothing here is derived locally; changing a constant breaks interop with
//! the sensor.

use std::time::Instant;

use rangecan_core::{
    DriverError, Measurement, MeasurementStatus, RangingMode, RegionOfInterest, TimingBudget,
};
use thiserror::Error;

/// Classic CAN payload limit in bytes.
pub const MAX_PAYLOAD: usize = 8;

/// Device class for laser ranging sensors.
pub const DEVICE_CLASS: u8 = 0x06;
/// Vendor identifier baked into every arbitration ID.
pub const MANUFACTURER: u8 = 0x21;

const CLASS_SHIFT: u32 = 24;
const MANUFACTURER_SHIFT: u32 = 16;
const KIND_SHIFT: u32 = 8;

/// Class + manufacturer bits of a 29-bit arbitration ID.
const PREFIX_MASK: u32 = 0x1FFF_0000;
const SENSOR_PREFIX: u32 =
    ((DEVICE_CLASS as u32) << CLASS_SHIFT) | ((MANUFACTURER as u32) << MANUFACTURER_SHIFT);

/// Payload lengths per message kind.
pub mod payload_len {
    pub const MEASUREMENT: usize = 8;
    pub const SET_RANGING_MODE: usize = 1;
    pub const SET_TIMING_BUDGET: usize = 1;
    pub const SET_ROI: usize = 4;
    pub const ACK: usize = 2;
}

/// Message kinds multiplexed over a device's arbitration ID space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Periodic measurement broadcast from the sensor.
    Measurement = 0x20,
    /// Host request: switch ranging mode.
    SetRangingMode = 0x30,
    /// Host request: switch timing budget.
    SetTimingBudget = 0x31,
    /// Host request: move the region of interest.
    SetRoi = 0x32,
    /// Sensor acknowledgement of a configuration request.
    Ack = 0x40,
}

impl MessageKind {
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0x20 => Some(Self::Measurement),
            0x30 => Some(Self::SetRangingMode),
            0x31 => Some(Self::SetTimingBudget),
            0x32 => Some(Self::SetRoi),
            0x40 => Some(Self::Ack),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u8 {
        self as u8
    }

    /// Whether this kind carries a host-to-device configuration request.
    pub fn is_config_request(self) -> bool {
        matches!(
            self,
            Self::SetRangingMode | Self::SetTimingBudget | Self::SetRoi
        )
    }
}

/// Frame decode failures. Discarded and counted by the session; device state
/// keeps its last good measurement.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{kind:?} payload must be {expected} bytes, got {actual}")]
    Length {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown message kind 0x{0:02X}")]
    UnknownMessageKind(u8),

    #[error("Invalid {field} byte 0x{value:02X} in {kind:?} payload")]
    InvalidField {
        kind: MessageKind,
        field: &'static str,
        value: u8,
    },
}

impl From<DecodeError> for DriverError {
    fn from(err: DecodeError) -> Self {
        DriverError::Decode(err.to_string())
    }
}

/// Pack an arbitration ID for a message to or from `can_id`.
pub fn arb_id(kind: MessageKind, can_id: u8) -> u32 {
    SENSOR_PREFIX | (u32::from(kind.as_raw()) << KIND_SHIFT) | u32::from(can_id)
}

/// Whether an arbitration ID belongs to this sensor class at all. Frames
/// from other classes sharing the bus are ignored, not decode errors.
pub fn is_sensor_frame(arb: u32) -> bool {
    arb & PREFIX_MASK == SENSOR_PREFIX
}

/// Device CAN ID carried in an arbitration ID.
pub fn device_id(arb: u32) -> u8 {
    (arb & 0xFF) as u8
}

/// Split a sensor-class arbitration ID into message kind and device CAN ID.
pub fn parse_arb_id(arb: u32) -> Result<(MessageKind, u8), DecodeError> {
    let raw_kind = ((arb >> KIND_SHIFT) & 0xFF) as u8;
    let kind = MessageKind::from_raw(raw_kind).ok_or(DecodeError::UnknownMessageKind(raw_kind))?;
    Ok((kind, device_id(arb)))
}

fn check_len(kind: MessageKind, expected: usize, data: &[u8]) -> Result<(), DecodeError> {
    if data.len() != expected {
        return Err(DecodeError::Length {
            kind,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Decode a measurement payload.
///
/// Layout: status, distance_mm (LE u16), ambient (LE u16), ranging mode,
/// timing budget in ms, reserved. Pure in the bytes: the same payload always
/// yields the same measurement.
pub fn decode_measurement(data: &[u8], timestamp: Instant) -> Result<Measurement, DecodeError> {
    check_len(MessageKind::Measurement, payload_len::MEASUREMENT, data)?;

    let status = MeasurementStatus::from_raw(data[0]);
    let distance_mm = u16::from_le_bytes([data[1], data[2]]);
    let ambient = u16::from_le_bytes([data[3], data[4]]);
    let mode = RangingMode::from_raw(data[5]).ok_or(DecodeError::InvalidField {
        kind: MessageKind::Measurement,
        field: "ranging mode",
        value: data[5],
    })?;
    let budget = TimingBudget::from_millis(data[6]).ok_or(DecodeError::InvalidField {
        kind: MessageKind::Measurement,
        field: "timing budget",
        value: data[6],
    })?;

    Ok(Measurement {
        status,
        distance_mm,
        ambient,
        mode,
        budget,
        timestamp,
    })
}

/// Encode a measurement payload (used by tests and bus simulators; real
/// measurement frames come from the sensor).
pub fn encode_measurement(
    status: u8,
    distance_mm: u16,
    ambient: u16,
    mode: RangingMode,
    budget: TimingBudget,
) -> [u8; payload_len::MEASUREMENT] {
    let distance = distance_mm.to_le_bytes();
    let ambient = ambient.to_le_bytes();
    [
        status,
        distance[0],
        distance[1],
        ambient[0],
        ambient[1],
        mode.as_raw(),
        budget.as_millis(),
        0, // reserved
    ]
}

pub fn encode_ranging_mode(mode: RangingMode) -> Vec<u8> {
    vec![mode.as_raw()]
}

pub fn encode_timing_budget(budget: TimingBudget) -> Vec<u8> {
    vec![budget.as_millis()]
}

pub fn encode_roi(roi: &RegionOfInterest) -> Vec<u8> {
    vec![roi.x, roi.y, roi.w, roi.h]
}

/// A decoded acknowledgement frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// The configuration request being acknowledged.
    pub kind: MessageKind,
    pub accepted: bool,
}

pub fn encode_ack(kind: MessageKind, accepted: bool) -> [u8; payload_len::ACK] {
    [kind.as_raw(), if accepted { 0 } else { 1 }]
}

pub fn decode_ack(data: &[u8]) -> Result<Ack, DecodeError> {
    check_len(MessageKind::Ack, payload_len::ACK, data)?;

    let kind = MessageKind::from_raw(data[0])
        .filter(|k| k.is_config_request())
        .ok_or(DecodeError::InvalidField {
            kind: MessageKind::Ack,
            field: "acked kind",
            value: data[0],
        })?;

    Ok(Ack {
        kind,
        accepted: data[1] == 0,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn arb_id_round_trips() {
        let arb = arb_id(MessageKind::Measurement, 5);
        assert!(is_sensor_frame(arb));
        assert_eq!(parse_arb_id(arb), Ok((MessageKind::Measurement, 5)));
    }

    #[test]
    fn foreign_class_frames_are_not_sensor_frames() {
        // motor controller class on the same bus
        let arb = 0x0201_0005;
        assert!(!is_sensor_frame(arb));
    }

    #[test]
    fn unknown_kind_within_class_is_a_decode_error() {
        let arb = SENSOR_PREFIX | (0x7Fu32 << KIND_SHIFT) | 5;
        assert!(is_sensor_frame(arb));
        assert_eq!(
            parse_arb_id(arb),
            Err(DecodeError::UnknownMessageKind(0x7F))
        );
    }

    #[test]
    fn measurement_decodes_known_bytes() {
        let data = encode_measurement(0, 1500, 40, RangingMode::Long, TimingBudget::Tb33ms);
        assert_eq!(&data[1..3], &1500u16.to_le_bytes());

        let m = decode_measurement(&data, Instant::now()).unwrap();
        assert_eq!(m.status, MeasurementStatus::Valid);
        assert_eq!(m.distance_mm, 1500);
        assert_eq!(m.ambient, 40);
        assert_eq!(m.mode, RangingMode::Long);
        assert_eq!(m.budget, TimingBudget::Tb33ms);
    }

    #[test]
    fn decoding_is_idempotent() {
        let data = encode_measurement(2, 310, 900, RangingMode::Short, TimingBudget::Tb100ms);
        let at = Instant::now();
        assert_eq!(
            decode_measurement(&data, at).unwrap(),
            decode_measurement(&data, at).unwrap()
        );
    }

    #[test]
    fn unknown_status_byte_is_not_a_decode_failure() {
        let data = encode_measurement(99, 1500, 0, RangingMode::Short, TimingBudget::Tb20ms);
        let m = decode_measurement(&data, Instant::now()).unwrap();
        assert_eq!(m.status, MeasurementStatus::Unknown(99));
        assert_eq!(m.valid_distance_mm(), None);
    }

    #[rstest]
    #[case(&[0u8; 3])]
    #[case(&[0u8; 7])]
    #[case(&[])]
    fn wrong_measurement_length_is_rejected(#[case] data: &[u8]) {
        assert_eq!(
            decode_measurement(data, Instant::now()),
            Err(DecodeError::Length {
                kind: MessageKind::Measurement,
                expected: payload_len::MEASUREMENT,
                actual: data.len(),
            })
        );
    }

    #[rstest]
    #[case(5, "ranging mode")]
    #[case(6, "timing budget")]
    fn unmappable_field_bytes_are_rejected(#[case] index: usize, #[case] field: &'static str) {
        let mut data =
            encode_measurement(0, 1500, 40, RangingMode::Short, TimingBudget::Tb33ms).to_vec();
        data[index] = 0xEE;
        assert_eq!(
            decode_measurement(&data, Instant::now()),
            Err(DecodeError::InvalidField {
                kind: MessageKind::Measurement,
                field,
                value: 0xEE,
            })
        );
    }

    #[test]
    fn ack_round_trips() {
        let data = encode_ack(MessageKind::SetRoi, true);
        assert_eq!(
            decode_ack(&data),
            Ok(Ack {
                kind: MessageKind::SetRoi,
                accepted: true,
            })
        );

        let data = encode_ack(MessageKind::SetTimingBudget, false);
        assert!(!decode_ack(&data).unwrap().accepted);
    }

    #[test]
    fn ack_for_a_non_config_kind_is_rejected() {
        let data = [MessageKind::Measurement.as_raw(), 0];
        assert!(matches!(
            decode_ack(&data),
            Err(DecodeError::InvalidField { field: "acked kind", .. })
        ));
    }
}
