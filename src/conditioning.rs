//! Signal conditioning: smoothing, calibration offsets, unit conversion.
//!
//! Raw sensor samples pass through here before the fault detector or the
//! packet codec ever see them. The pipeline per channel is always:
//!
//! ```text
//!  raw ──▶ EMA smoothing ──▶ + persisted offset ──▶ unit conversion
//! ```
//!
//! Conversions clamp the raw domain *before* the linear map, so a faulted
//! sensor saturates at a physically possible endpoint instead of producing
//! an impossible reading. The fault bit, not the value, is how a fault is
//! reported downstream.

/// Exponential moving average with a warm-up gate.
///
/// `smoothed = alpha * raw + (1 - alpha) * prev`. Until
/// `min_valid_samples` raw readings have been folded in, [`Ema::value`]
/// returns `None` and the caller must not transmit the channel as valid.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f32,
    min_valid_samples: u32,
    state: f32,
    samples: u32,
}

impl Ema {
    pub fn new(alpha: f32, min_valid_samples: u32) -> Self {
        debug_assert!(alpha > 0.0 && alpha < 1.0);
        Self {
            alpha,
            min_valid_samples,
            state: 0.0,
            samples: 0,
        }
    }

    /// Fold one raw sample in and return the smoothed value, or `None`
    /// while still warming up. NaN samples are skipped entirely — they
    /// carry no signal and would poison the average.
    pub fn update(&mut self, raw: f32) -> Option<f32> {
        if raw.is_nan() {
            return self.value();
        }
        if self.samples == 0 {
            self.state = raw;
        } else {
            self.state = self.alpha * raw + (1.0 - self.alpha) * self.state;
        }
        self.samples = self.samples.saturating_add(1);
        self.value()
    }

    /// Current smoothed value, `None` until warmed up.
    pub fn value(&self) -> Option<f32> {
        (self.samples >= self.min_valid_samples).then_some(self.state)
    }

    /// Discard all state, e.g. after a calibration changes the offsets.
    pub fn reset(&mut self) {
        self.state = 0.0;
        self.samples = 0;
    }
}

/// Apply the persisted per-channel calibration offset. Applied *after*
/// smoothing so a noisy sample cannot momentarily shift the correction.
#[inline]
pub fn apply_offset(smoothed: f32, offset: f32) -> f32 {
    smoothed + offset
}

/// Linear map from a clamped raw domain onto an engineering-unit range.
///
/// `min_domain` maps to exactly `0.0`, `max_domain` to exactly
/// `full_scale`; out-of-domain inputs saturate silently at those
/// endpoints.
#[derive(Debug, Clone, Copy)]
pub struct LinearMap {
    pub min_domain: f32,
    pub max_domain: f32,
    pub full_scale: f32,
}

impl LinearMap {
    pub fn new(min_domain: f32, max_domain: f32, full_scale: f32) -> Self {
        debug_assert!(max_domain > min_domain);
        Self {
            min_domain,
            max_domain,
            full_scale,
        }
    }

    pub fn map(&self, raw: f32) -> f32 {
        let clamped = raw.clamp(self.min_domain, self.max_domain);
        (clamped - self.min_domain) / (self.max_domain - self.min_domain) * self.full_scale
    }
}

/// Resistance → fuel percentage for a resistive tank sender.
///
/// The same linear-map pattern, but the domain is anchored at the two
/// calibration points. Each anchor is the nominal resistance corrected by
/// its persisted offset (`offset = nominal - measured`, so the corrected
/// anchor is the resistance this particular sender actually reads at that
/// reference point). Resistance falls as the tank fills, hence the
/// inverted map. Output is clamped to [0, 100].
#[derive(Debug, Clone, Copy)]
pub struct FuelGauge {
    empty_anchor_ohms: f32,
    full_anchor_ohms: f32,
}

impl FuelGauge {
    pub fn new(
        empty_nominal_ohms: f32,
        full_nominal_ohms: f32,
        empty_offset: f32,
        full_offset: f32,
    ) -> Self {
        Self {
            empty_anchor_ohms: empty_nominal_ohms - empty_offset,
            full_anchor_ohms: full_nominal_ohms - full_offset,
        }
    }

    pub fn percent(&self, resistance_ohms: f32) -> f32 {
        let span = self.empty_anchor_ohms - self.full_anchor_ohms;
        if span <= 0.0 {
            // Degenerate calibration; report empty rather than divide by zero.
            return 0.0;
        }
        let pct = (self.empty_anchor_ohms - resistance_ohms) / span * 100.0;
        pct.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_warmup_gate() {
        let mut ema = Ema::new(0.2, 2);
        assert_eq!(ema.update(50.0), None);
        assert!(ema.update(50.0).is_some());
    }

    #[test]
    fn ema_converges_toward_input() {
        let mut ema = Ema::new(0.2, 2);
        for _ in 0..100 {
            ema.update(42.0);
        }
        let v = ema.value().unwrap();
        assert!((v - 42.0).abs() < 0.001);
    }

    #[test]
    fn ema_weights_newest_sample_by_alpha() {
        let mut ema = Ema::new(0.2, 1);
        ema.update(10.0);
        let v = ema.update(20.0).unwrap();
        // 0.2 * 20 + 0.8 * 10
        assert!((v - 12.0).abs() < 0.0001);
    }

    #[test]
    fn ema_skips_nan() {
        let mut ema = Ema::new(0.2, 1);
        ema.update(30.0);
        let before = ema.value().unwrap();
        ema.update(f32::NAN);
        assert_eq!(ema.value().unwrap(), before);
    }

    #[test]
    fn offset_applied_after_smoothing() {
        assert!((apply_offset(70.0, -2.0) - 68.0).abs() < f32::EPSILON);
    }

    #[test]
    fn linear_map_endpoints_exact() {
        let map = LinearMap::new(0.34, 3.07, 100.0);
        assert_eq!(map.map(0.34), 0.0);
        assert!((map.map(3.07) - 100.0).abs() < 0.0001);
    }

    #[test]
    fn linear_map_clamps_out_of_domain() {
        let map = LinearMap::new(0.34, 3.07, 100.0);
        assert_eq!(map.map(0.0), 0.0);
        assert!((map.map(5.0) - 100.0).abs() < 0.0001);
    }

    #[test]
    fn fuel_gauge_nominal_anchors() {
        let gauge = FuelGauge::new(73.0, 10.0, 0.0, 0.0);
        assert_eq!(gauge.percent(73.0), 0.0);
        assert!((gauge.percent(10.0) - 100.0).abs() < 0.0001);
        let mid = gauge.percent(41.5);
        assert!((mid - 50.0).abs() < 0.01);
    }

    #[test]
    fn fuel_gauge_offset_corrected_anchors() {
        // This sender reads 75 Ω at empty and 8 Ω at full, so calibration
        // stored empty_offset = -2, full_offset = +2.
        let gauge = FuelGauge::new(73.0, 10.0, -2.0, 2.0);
        assert_eq!(gauge.percent(75.0), 0.0);
        assert!((gauge.percent(8.0) - 100.0).abs() < 0.0001);
    }

    #[test]
    fn fuel_gauge_clamps_output() {
        let gauge = FuelGauge::new(73.0, 10.0, 0.0, 0.0);
        assert_eq!(gauge.percent(150.0), 0.0);
        assert_eq!(gauge.percent(1.0), 100.0);
    }
}
