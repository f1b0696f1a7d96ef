//! CarMon sender firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod calibration;
pub mod conditioning;
pub mod config;
pub mod fault;
pub mod node;
pub mod packet;
pub mod ports;
pub mod scheduler;

pub mod error;
pub mod pins;

pub mod adapters;
pub mod sensors;
