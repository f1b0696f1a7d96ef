//! Interval-gated cadences for the single-threaded control loop.
//!
//! Every pass of the main loop polls three independent [`Cadence`]s against
//! the shared monotonic clock:
//!
//! ```text
//!  loop pass ──▶ sample.due(now)?   ──▶ read + condition + classify
//!           ──▶ transmit.due(now)? ──▶ encode frame + send
//!           ──▶ display.due(now)?  ──▶ refresh local OLED (cosmetic)
//! ```
//!
//! Transmission is deliberately slower than sampling so the wireless link
//! is not saturated by the ADC rate. There is no preemption: a calibration
//! session simply starves the cadences for its duration, which is an
//! accepted property of a field-calibration tool.

/// A wrap-safe interval gate over the `u32` millisecond clock.
///
/// `due` returns `true` at most once per `period_ms` window and rearms
/// itself. `u32::wrapping_sub` keeps the gate correct across the ~49.7-day
/// rollover of `millis()`.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    period_ms: u32,
    last_fire_ms: u32,
    primed: bool,
}

impl Cadence {
    pub fn new(period_ms: u32) -> Self {
        debug_assert!(period_ms > 0, "zero-period cadence would fire every pass");
        Self {
            period_ms,
            last_fire_ms: 0,
            primed: false,
        }
    }

    /// Poll the gate. Fires immediately on the first poll after boot, then
    /// every `period_ms` thereafter.
    pub fn due(&mut self, now_ms: u32) -> bool {
        if !self.primed {
            self.primed = true;
            self.last_fire_ms = now_ms;
            return true;
        }
        if now_ms.wrapping_sub(self.last_fire_ms) >= self.period_ms {
            self.last_fire_ms = now_ms;
            return true;
        }
        false
    }

    /// Push the next fire out a full period from `now_ms` without firing.
    /// Used when a calibration session releases the loop, so all cadences
    /// restart from a clean phase instead of firing in a burst.
    pub fn rearm(&mut self, now_ms: u32) {
        self.primed = true;
        self.last_fire_ms = now_ms;
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_first_poll() {
        let mut c = Cadence::new(500);
        assert!(c.due(12_345));
    }

    #[test]
    fn respects_period() {
        let mut c = Cadence::new(500);
        assert!(c.due(0));
        assert!(!c.due(100));
        assert!(!c.due(499));
        assert!(c.due(500));
        assert!(!c.due(999));
        assert!(c.due(1_000));
    }

    #[test]
    fn survives_clock_wrap() {
        let mut c = Cadence::new(1_000);
        assert!(c.due(u32::MAX - 200));
        assert!(!c.due(u32::MAX - 100));
        // 800 ms spans the wrap boundary; 200 + 801 past the last fire.
        assert!(c.due(800));
    }

    #[test]
    fn rearm_delays_next_fire() {
        let mut c = Cadence::new(500);
        assert!(c.due(0));
        c.rearm(10_000);
        assert!(!c.due(10_400));
        assert!(c.due(10_500));
    }

    #[test]
    fn independent_cadences_interleave() {
        let mut sample = Cadence::new(500);
        let mut transmit = Cadence::new(1_000);
        let mut samples = 0;
        let mut transmits = 0;
        for now in (0..=4_000).step_by(100) {
            if sample.due(now) {
                samples += 1;
            }
            if transmit.due(now) {
                transmits += 1;
            }
        }
        assert_eq!(samples, 9); // t = 0, 500, ... 4000
        assert_eq!(transmits, 5); // t = 0, 1000, ... 4000
    }
}
