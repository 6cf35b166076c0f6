//! Data model for sensor measurements and settings

mod measurement;
mod settings;

pub use measurement::{status_code, Measurement, MeasurementStatus};
pub use settings::{RangingMode, RegionOfInterest, TimingBudget, ROI_GRID, ROI_MIN_WINDOW};
