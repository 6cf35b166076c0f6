//! Sensor configuration settings: ranging mode, timing budget, region of
//! interest

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// Ranging mode trade-off: `Short` is more immune to ambient light, `Long`
/// extends the usable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangingMode {
    Short,
    Long,
}

impl RangingMode {
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Short),
            1 => Some(Self::Long),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> u8 {
        match self {
            Self::Short => 0,
            Self::Long => 1,
        }
    }
}

/// Per-reading integration time. Larger budgets give more accurate and more
/// repeatable readings, at a lower update rate. Exactly one budget is active
/// per device at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingBudget {
    #[serde(rename = "20ms")]
    Tb20ms,
    #[serde(rename = "33ms")]
    Tb33ms,
    #[serde(rename = "50ms")]
    Tb50ms,
    #[serde(rename = "100ms")]
    Tb100ms,
}

impl TimingBudget {
    /// Budget duration in milliseconds; doubles as the wire encoding.
    pub fn as_millis(&self) -> u8 {
        match self {
            Self::Tb20ms => 20,
            Self::Tb33ms => 33,
            Self::Tb50ms => 50,
            Self::Tb100ms => 100,
        }
    }

    pub fn from_millis(value: u8) -> Option<Self> {
        match value {
            20 => Some(Self::Tb20ms),
            33 => Some(Self::Tb33ms),
            50 => Some(Self::Tb50ms),
            100 => Some(Self::Tb100ms),
            _ => None,
        }
    }
}

impl fmt::Display for TimingBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.as_millis())
    }
}

/// Side length of the sensor's square field of view, in grid cells.
pub const ROI_GRID: u8 = 16;
/// Smallest addressable window, in grid cells.
pub const ROI_MIN_WINDOW: u8 = 4;

/// Rectangular sub-window of the field of view the sensor ranges on.
///
/// `x`/`y` are the window center and `w`/`h` its size, all in grid cells.
/// Centers may sit on half-cell boundaries, so a window is representable
/// whenever 2*center ± size stays within the doubled grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub x: u8,
    pub y: u8,
    pub w: u8,
    pub h: u8,
}

impl RegionOfInterest {
    pub fn new(x: u8, y: u8, w: u8, h: u8) -> Self {
        Self { x, y, w, h }
    }

    /// Check the window against the sensor's addressable field. Called
    /// before any configuration frame is encoded; an `Err` here means
    /// nothing was transmitted.
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.w < ROI_MIN_WINDOW || self.h < ROI_MIN_WINDOW {
            return Err(DriverError::InvalidConfiguration(format!(
                "ROI window {}x{} is below the {}x{} minimum",
                self.w, self.h, ROI_MIN_WINDOW, ROI_MIN_WINDOW
            )));
        }
        if self.w > ROI_GRID || self.h > ROI_GRID {
            return Err(DriverError::InvalidConfiguration(format!(
                "ROI window {}x{} exceeds the {}x{} field",
                self.w, self.h, ROI_GRID, ROI_GRID
            )));
        }

        let limit = u16::from(ROI_GRID) * 2;
        let (x2, y2) = (u16::from(self.x) * 2, u16::from(self.y) * 2);
        if x2 < u16::from(self.w)
            || x2 + u16::from(self.w) > limit
            || y2 < u16::from(self.h)
            || y2 + u16::from(self.h) > limit
        {
            return Err(DriverError::InvalidConfiguration(format!(
                "ROI window {}x{} centered at ({}, {}) extends past the {}x{} field",
                self.w, self.h, self.x, self.y, ROI_GRID, ROI_GRID
            )));
        }

        Ok(())
    }
}

impl Default for RegionOfInterest {
    /// Full field of view.
    fn default() -> Self {
        Self {
            x: 8,
            y: 8,
            w: 16,
            h: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_field_roi_is_valid() {
        assert!(RegionOfInterest::default().validate().is_ok());
    }

    #[test]
    fn small_centered_window_is_valid() {
        assert!(RegionOfInterest::new(8, 8, 4, 4).validate().is_ok());
    }

    #[test]
    fn undersized_window_is_rejected() {
        let err = RegionOfInterest::new(8, 8, 2, 4).validate().unwrap_err();
        assert!(matches!(err, DriverError::InvalidConfiguration(_)));
    }

    #[test]
    fn oversized_window_is_rejected() {
        assert!(RegionOfInterest::new(8, 8, 17, 4).validate().is_err());
    }

    #[test]
    fn window_past_the_edge_is_rejected() {
        // center too close to the left edge for an 8-cell window
        assert!(RegionOfInterest::new(2, 8, 8, 8).validate().is_err());
        // and too close to the bottom edge
        assert!(RegionOfInterest::new(8, 14, 8, 8).validate().is_err());
    }

    #[test]
    fn timing_budget_wire_values_round_trip() {
        for budget in [
            TimingBudget::Tb20ms,
            TimingBudget::Tb33ms,
            TimingBudget::Tb50ms,
            TimingBudget::Tb100ms,
        ] {
            assert_eq!(TimingBudget::from_millis(budget.as_millis()), Some(budget));
        }
        assert_eq!(TimingBudget::from_millis(45), None);
    }

    #[test]
    fn ranging_mode_raw_values_round_trip() {
        assert_eq!(RangingMode::from_raw(0), Some(RangingMode::Short));
        assert_eq!(RangingMode::from_raw(1), Some(RangingMode::Long));
        assert_eq!(RangingMode::from_raw(2), None);
    }
}
