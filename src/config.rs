//! System configuration parameters.
//!
//! All tunable parameters for both sender nodes. Timing and threshold
//! defaults follow the deployed hardware: a 1972 VW Superbeetle fuel sender
//! (73 Ω empty → 10 Ω full) on the fuel node, and MAX31856 thermocouples
//! plus a 0–100 PSI pressure sender on the oil node.

use serde::{Deserialize, Serialize};

/// Fuel sender node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuelConfig {
    // --- Sender resistance anchors ---
    /// Nominal sender resistance at an empty tank (Ω).
    pub empty_ohms_nominal: f32,
    /// Nominal sender resistance at a full tank (Ω).
    pub full_ohms_nominal: f32,

    // --- Fault detection ---
    /// Resistance above this is an open circuit (Ω).
    pub open_circuit_ohms: f32,
    /// Resistance below this is a short circuit (Ω).
    pub short_circuit_ohms: f32,
    /// Number of consecutive classifications that must agree before a
    /// fault bit is asserted (majority vote).
    pub majority_vote_window: usize,

    // --- Smoothing ---
    /// Exponential moving average weight for the newest sample, in (0,1).
    pub smoothing_alpha: f32,
    /// Raw readings required before the smoothed value is trusted.
    pub min_valid_samples: u32,

    // --- Voltage divider ---
    /// Series resistor between the 3.3 V rail and the sender (Ω).
    pub divider_series_ohms: f32,
    /// Supply voltage across the divider (V).
    pub divider_vcc: f32,

    // --- Calibration ---
    /// Live readings collected (one per tick) per calibration sample run.
    pub calibration_samples: usize,

    // --- Timing ---
    /// ADC sample interval (milliseconds).
    pub sample_interval_ms: u32,
    /// ESP-NOW transmit interval (milliseconds), decoupled from sampling.
    pub transmit_interval_ms: u32,
    /// Local OLED refresh interval (milliseconds), cosmetic only.
    pub display_interval_ms: u32,
}

impl Default for FuelConfig {
    fn default() -> Self {
        Self {
            empty_ohms_nominal: 73.0,
            full_ohms_nominal: 10.0,

            open_circuit_ohms: 100.0,
            short_circuit_ohms: 5.0,
            majority_vote_window: 3,

            smoothing_alpha: 0.2,
            min_valid_samples: 2,

            divider_series_ohms: 100.0,
            divider_vcc: 3.3,

            calibration_samples: 10,

            sample_interval_ms: 500,    // 2 Hz
            transmit_interval_ms: 1000, // 1 Hz
            display_interval_ms: 100,   // 10 Hz
        }
    }
}

/// Oil temperature/pressure node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OilConfig {
    // --- Pressure sender (via ADS1115 behind a voltage divider) ---
    /// Divider-scaled sender voltage at 0 PSI (V).
    pub pressure_min_volts: f32,
    /// Divider-scaled sender voltage at full scale (V).
    pub pressure_max_volts: f32,
    /// Pressure at `pressure_max_volts` (PSI).
    pub pressure_full_scale_psi: f32,

    // --- Smoothing ---
    /// Exponential moving average weight for the newest sample, in (0,1).
    pub smoothing_alpha: f32,
    /// Raw readings required before the smoothed value is trusted.
    pub min_valid_samples: u32,

    // --- Timing ---
    /// Thermocouple/ADC sample interval (milliseconds).
    pub sample_interval_ms: u32,
    /// ESP-NOW transmit interval (milliseconds).
    pub transmit_interval_ms: u32,
    /// Local OLED refresh interval (milliseconds).
    pub display_interval_ms: u32,
}

impl Default for OilConfig {
    fn default() -> Self {
        Self {
            // 0.5–4.5 V sensor behind a 4.7k/(2.2k+4.7k) divider.
            pressure_min_volts: 0.34,
            pressure_max_volts: 3.07,
            pressure_full_scale_psi: 100.0,

            smoothing_alpha: 0.2,
            min_valid_samples: 2,

            sample_interval_ms: 500,
            transmit_interval_ms: 1000,
            display_interval_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fuel_config_is_sane() {
        let c = FuelConfig::default();
        assert!(c.empty_ohms_nominal > c.full_ohms_nominal);
        assert!(c.open_circuit_ohms > c.empty_ohms_nominal);
        assert!(c.short_circuit_ohms < c.full_ohms_nominal);
        assert!(c.smoothing_alpha > 0.0 && c.smoothing_alpha < 1.0);
        assert!(c.majority_vote_window >= 1);
        assert!(c.calibration_samples >= 3);
    }

    #[test]
    fn default_oil_config_is_sane() {
        let c = OilConfig::default();
        assert!(c.pressure_min_volts < c.pressure_max_volts);
        assert!(c.pressure_full_scale_psi > 0.0);
        assert!(c.smoothing_alpha > 0.0 && c.smoothing_alpha < 1.0);
    }

    #[test]
    fn timing_ratios_make_sense() {
        let c = FuelConfig::default();
        assert!(
            c.sample_interval_ms < c.transmit_interval_ms,
            "sampling must run faster than transmission"
        );
        assert!(c.display_interval_ms < c.sample_interval_ms);
    }

    #[test]
    fn serde_roundtrip() {
        let c = FuelConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: FuelConfig = postcard::from_bytes(&bytes).unwrap();
        assert!((c.empty_ohms_nominal - c2.empty_ohms_nominal).abs() < f32::EPSILON);
        assert_eq!(c.sample_interval_ms, c2.sample_interval_ms);
    }
}
