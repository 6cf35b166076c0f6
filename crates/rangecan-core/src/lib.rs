//! rangecan-core - Core types for CAN-addressable laser ranging sensors
//!
//! This crate provides the shared vocabulary of the rangecan driver stack:
//! measurements and their status classification, sensor settings (ranging
//! mode, timing budget, region of interest), and the caller-facing error
//! enum.

pub mod error;
pub mod models;

pub use error::{DriverError, DriverResult};
pub use models::*;
