//! Field calibration: persisted per-node records and the interactive
//! session engine that computes offsets from live readings.
//!
//! The store is the single source of truth the signal conditioner reads
//! every cycle; the engine is its only writer (plus the reset path).

pub mod engine;
pub mod store;

pub use engine::{CalibrationEngine, OperatorInput, ReferencePoint, SessionEvent};
pub use store::{FuelCalibration, FuelCalibrationStore, OilCalibration, OilCalibrationStore};
