//! Driven adapters: concrete [`crate::ports`] implementations.
//!
//! Everything ESP-IDF-specific lives behind `#[cfg(target_os = "espidf")]`
//! inside each module; host builds get simulation backends so the whole
//! pipeline tests without hardware.

pub mod console;
pub mod espnow;
pub mod nvs;
pub mod time;
