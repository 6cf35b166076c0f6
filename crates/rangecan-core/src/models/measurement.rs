//! Sensor measurements and their status classification

use std::fmt;
use std::time::{Duration, Instant};

use crate::models::settings::{RangingMode, TimingBudget};

/// Raw status codes reported by the sensor firmware.
///
/// The numeric values are part of the bus contract and must not change.
pub mod status_code {
    /// Measurement is valid.
    pub const VALID: u8 = 0;
    /// Signal obtained in a high-noise environment. A larger timing budget
    /// may make the reading more reliable.
    pub const NOISE_ISSUE: u8 = 1;
    /// Return signal too weak: target too far away, too small, or not
    /// reflective enough.
    pub const WEAK_SIGNAL: u8 = 2;
    /// Object detected at the limits of the sensor's range. Usually only
    /// seen with bright targets.
    pub const OUT_OF_BOUNDS: u8 = 4;
    /// Highly reflective target beyond the theoretical range; the reported
    /// distance wraps around to a smaller value.
    pub const WRAPAROUND: u8 = 7;
}

/// Reliability classification of a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementStatus {
    Valid,
    NoiseIssue,
    WeakSignal,
    OutOfBounds,
    Wraparound,
    /// Status code outside the known set (e.g. newer firmware). Never an
    /// error on its own; callers decide policy, and
    /// [`Measurement::valid_distance_mm`] treats it as not-valid.
    Unknown(u8),
}

impl MeasurementStatus {
    /// Classify a raw status byte. Total: unmapped codes become `Unknown`.
    pub fn from_raw(value: u8) -> Self {
        match value {
            status_code::VALID => Self::Valid,
            status_code::NOISE_ISSUE => Self::NoiseIssue,
            status_code::WEAK_SIGNAL => Self::WeakSignal,
            status_code::OUT_OF_BOUNDS => Self::OutOfBounds,
            status_code::WRAPAROUND => Self::Wraparound,
            other => Self::Unknown(other),
        }
    }

    pub fn as_raw(&self) -> u8 {
        match self {
            Self::Valid => status_code::VALID,
            Self::NoiseIssue => status_code::NOISE_ISSUE,
            Self::WeakSignal => status_code::WEAK_SIGNAL,
            Self::OutOfBounds => status_code::OUT_OF_BOUNDS,
            Self::Wraparound => status_code::WRAPAROUND,
            Self::Unknown(v) => *v,
        }
    }

    /// Whether the associated distance can be trusted for control decisions.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for MeasurementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "Valid"),
            Self::NoiseIssue => write!(f, "NoiseIssue"),
            Self::WeakSignal => write!(f, "WeakSignal"),
            Self::OutOfBounds => write!(f, "OutOfBounds"),
            Self::Wraparound => write!(f, "Wraparound"),
            Self::Unknown(v) => write!(f, "Unknown(0x{:02X})", v),
        }
    }
}

/// A single distance reading from a sensor.
///
/// `distance_mm` is meaningful only when `status` is `Valid`; control code
/// should go through [`Measurement::valid_distance_mm`] instead of reading
/// the field directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub status: MeasurementStatus,
    /// Raw distance in millimetres. May be stale or wrapped when the status
    /// is not `Valid`.
    pub distance_mm: u16,
    /// Ambient light level seen by the sensor.
    pub ambient: u16,
    /// Ranging mode the sensor reports as active.
    pub mode: RangingMode,
    /// Timing budget the sensor reports as active.
    pub budget: TimingBudget,
    /// When the frame carrying this measurement was received.
    pub timestamp: Instant,
}

impl Measurement {
    /// Distance in millimetres, gated on a `Valid` status.
    pub fn valid_distance_mm(&self) -> Option<u16> {
        self.status.is_valid().then_some(self.distance_mm)
    }

    /// Age of this reading relative to `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_round_trip() {
        for raw in [0u8, 1, 2, 4, 7] {
            assert_eq!(MeasurementStatus::from_raw(raw).as_raw(), raw);
        }
    }

    #[test]
    fn unmapped_codes_classify_as_unknown() {
        assert_eq!(
            MeasurementStatus::from_raw(99),
            MeasurementStatus::Unknown(99)
        );
        // reserved gap inside the known range
        assert_eq!(
            MeasurementStatus::from_raw(3),
            MeasurementStatus::Unknown(3)
        );
        assert!(!MeasurementStatus::from_raw(99).is_valid());
    }

    #[test]
    fn distance_is_gated_on_valid_status() {
        let m = Measurement {
            status: MeasurementStatus::WeakSignal,
            distance_mm: 1200,
            ambient: 3,
            mode: RangingMode::Short,
            budget: TimingBudget::Tb33ms,
            timestamp: Instant::now(),
        };
        assert_eq!(m.valid_distance_mm(), None);

        let m = Measurement {
            status: MeasurementStatus::Valid,
            ..m
        };
        assert_eq!(m.valid_distance_mm(), Some(1200));
    }
}
