//! Resistive fuel sender, read through a voltage divider on the ESP32-C6
//! ADC (12-bit, 0–3.3 V full range).
//!
//! The sender (73 Ω empty → 10 Ω full) sits between the measurement node
//! and ground, with a fixed 100 Ω series resistor to the 3.3 V rail:
//!
//! ```text
//!   3.3 V ──[ 100 Ω ]──●── ADC
//!                      │
//!                   [ sender ]
//!                      │
//!                     GND
//! ```
//!
//! so `R = Rs · v / (Vcc − v)`. A disconnected sender pulls the node to
//! the rail and the resistance computes to infinity, which the fault
//! detector classifies as an open circuit — deliberately distinct from a
//! failed ADC read, which yields NaN.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

const ADC_MAX_COUNT: f32 = 4095.0;

/// Latest raw ADC count published by the bus glue (or a host test).
static RAW_COUNT: AtomicU16 = AtomicU16::new(2048);
/// Set when the last ADC conversion itself failed.
static READ_FAILED: AtomicBool = AtomicBool::new(false);

/// Publish one raw conversion result. Called from the ADC glue on device
/// and from tests on the host.
pub fn publish_raw(count: u16) {
    READ_FAILED.store(false, Ordering::Relaxed);
    RAW_COUNT.store(count, Ordering::Relaxed);
}

/// Mark the ADC as unreadable until the next successful conversion.
pub fn publish_read_failure() {
    READ_FAILED.store(true, Ordering::Relaxed);
}

/// Fuel sender front-end: raw count → sender resistance in ohms.
#[derive(Debug, Clone, Copy)]
pub struct FuelLevelSensor {
    series_ohms: f32,
    vcc: f32,
}

impl FuelLevelSensor {
    pub fn new(series_ohms: f32, vcc: f32) -> Self {
        Self { series_ohms, vcc }
    }

    /// Current sender resistance (Ω).
    ///
    /// NaN when the read itself failed; `f32::INFINITY` when the divider
    /// is railed high (open sender).
    pub fn read_ohms(&self) -> f32 {
        if READ_FAILED.load(Ordering::Relaxed) {
            return f32::NAN;
        }
        let raw = RAW_COUNT.load(Ordering::Relaxed);
        self.count_to_ohms(raw)
    }

    fn count_to_ohms(&self, raw: u16) -> f32 {
        let v = f32::from(raw.min(4095)) / ADC_MAX_COUNT * self.vcc;
        if v >= self.vcc - 0.01 {
            return f32::INFINITY; // node railed — open sender
        }
        if v <= 0.005 {
            return 0.0; // dead short
        }
        self.series_ohms * v / (self.vcc - v)
    }
}
