//! Fault detection: classify conditioned/raw readings into per-channel
//! fault bitmasks.
//!
//! Fault bits are carried data, not control flow: a faulted channel keeps
//! transmitting with its bit set so the display unit can alert the driver
//! instead of silently losing the channel. `0x00` is fully nominal; `0xFF`
//! is reserved to mean "the read operation itself failed" for converters
//! (MAX31856) that report it that way.

use log::warn;

/// Fault bit assignments for one channel byte.
///
/// Bits 4–7 are reserved. Bits are independent — a reading can carry the
/// low-fuel warning with no circuit fault, or both circuit bits at once
/// never (the bounds are disjoint), but nothing in the encoding forbids it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultBit {
    /// Reading above the configured upper bound (sender disconnected).
    OpenCircuit = 0b0000_0001,
    /// Reading below the configured lower bound (sender shorted).
    ShortCircuit = 0b0000_0010,
    /// The device produced no usable value at all (NaN / bus error).
    SensorError = 0b0000_0100,
    /// Conditioned level below the persisted warning threshold.
    LowLevel = 0b0000_1000,
}

impl FaultBit {
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

/// The whole channel byte when the read itself failed.
pub const FAULT_READ_FAILED: u8 = 0xFF;

/// Circuit and warning bounds for one resistive channel.
#[derive(Debug, Clone, Copy)]
pub struct FaultThresholds {
    /// Resistance above this asserts [`FaultBit::OpenCircuit`] (Ω).
    pub open_circuit_ohms: f32,
    /// Resistance below this asserts [`FaultBit::ShortCircuit`] (Ω).
    pub short_circuit_ohms: f32,
    /// Conditioned percentage below this asserts [`FaultBit::LowLevel`].
    pub low_level_percent: f32,
}

/// Classify one sample into a fault bitmask.
///
/// A NaN raw reading sets [`FaultBit::SensorError`] and suppresses the
/// open/short bits for that cycle — the device did not produce a value, so
/// there is nothing to range-check. The low-level bit is orthogonal to the
/// circuit bits and derives from the *conditioned* value, which survives a
/// single bad raw sample via smoothing.
pub fn classify(
    raw_ohms: f32,
    conditioned_percent: Option<f32>,
    thresholds: &FaultThresholds,
) -> u8 {
    let mut mask = 0u8;

    if raw_ohms.is_nan() {
        mask |= FaultBit::SensorError.mask();
    } else {
        if raw_ohms > thresholds.open_circuit_ohms {
            mask |= FaultBit::OpenCircuit.mask();
        }
        if raw_ohms < thresholds.short_circuit_ohms {
            mask |= FaultBit::ShortCircuit.mask();
        }
    }

    if let Some(pct) = conditioned_percent {
        if pct < thresholds.low_level_percent {
            mask |= FaultBit::LowLevel.mask();
        }
    }

    mask
}

/// Majority-vote debouncer over the last `N` classifications.
///
/// A bit appears in the voted mask only when it is set in a strict
/// majority of the window, so a single-sample transient (ignition noise,
/// fuel slosh) cannot assert a fault. The cost is `N` samples of latency
/// before a real fault is reported.
#[derive(Debug, Clone)]
pub struct MajorityVoter<const N: usize> {
    window: [u8; N],
    head: usize,
    count: usize,
    last_voted: u8,
}

impl<const N: usize> MajorityVoter<N> {
    pub fn new() -> Self {
        Self {
            window: [0; N],
            head: 0,
            count: 0,
            last_voted: 0,
        }
    }

    /// Push one classification and return the voted mask.
    ///
    /// Until the window is full, votes run over the samples seen so far
    /// (majority of `count`), so a fault present from boot is still
    /// reported without waiting for `N` samples of history. The flip side:
    /// transient suppression only holds once `N` samples have accumulated —
    /// the very first sample after construction or [`reset`](Self::reset)
    /// is a 1-of-1 majority, so an anomalous one asserts for a cycle before
    /// subsequent clean samples outvote it.
    pub fn push(&mut self, mask: u8) -> u8 {
        self.window[self.head] = mask;
        self.head = (self.head + 1) % N;
        if self.count < N {
            self.count += 1;
        }

        let mut voted = 0u8;
        for bit in 0..8u8 {
            let m = 1 << bit;
            let set = self.window[..self.count].iter().filter(|&&s| s & m != 0).count();
            if set * 2 > self.count {
                voted |= m;
            }
        }

        if voted != self.last_voted {
            warn!(
                "fault mask changed {:#04x} -> {:#04x}",
                self.last_voted, voted
            );
            self.last_voted = voted;
        }
        voted
    }

    pub fn reset(&mut self) {
        self.window = [0; N];
        self.head = 0;
        self.count = 0;
        self.last_voted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TH: FaultThresholds = FaultThresholds {
        open_circuit_ohms: 100.0,
        short_circuit_ohms: 5.0,
        low_level_percent: 15.0,
    };

    #[test]
    fn nominal_reading_is_clean() {
        assert_eq!(classify(40.0, Some(50.0), &TH), 0x00);
    }

    #[test]
    fn open_circuit_above_bound() {
        assert_eq!(classify(120.0, None, &TH), FaultBit::OpenCircuit.mask());
    }

    #[test]
    fn short_circuit_below_bound() {
        assert_eq!(classify(2.0, None, &TH), FaultBit::ShortCircuit.mask());
    }

    #[test]
    fn nan_sets_sensor_error_and_suppresses_circuit_bits() {
        let mask = classify(f32::NAN, None, &TH);
        assert_eq!(mask, FaultBit::SensorError.mask());
    }

    #[test]
    fn low_level_is_orthogonal_to_circuit_faults() {
        let mask = classify(72.0, Some(4.0), &TH);
        assert_eq!(mask, FaultBit::LowLevel.mask());

        let mask = classify(120.0, Some(4.0), &TH);
        assert_eq!(
            mask,
            FaultBit::OpenCircuit.mask() | FaultBit::LowLevel.mask()
        );
    }

    #[test]
    fn classify_is_monotonic_in_distance_from_nominal() {
        // If a closer reading asserts open-circuit, every reading further
        // out must as well.
        let mut last_open = false;
        for ohms in [90.0, 101.0, 110.0, 500.0, 10_000.0] {
            let open = classify(ohms, None, &TH) & FaultBit::OpenCircuit.mask() != 0;
            assert!(open || !last_open, "fault bit cleared further from nominal");
            last_open = open;
        }
    }

    #[test]
    fn single_transient_does_not_assert() {
        let mut voter: MajorityVoter<3> = MajorityVoter::new();
        voter.push(0x00);
        voter.push(0x00);
        let voted = voter.push(FaultBit::OpenCircuit.mask());
        assert_eq!(voted & FaultBit::OpenCircuit.mask(), 0);
    }

    #[test]
    fn two_of_three_asserts() {
        let mut voter: MajorityVoter<3> = MajorityVoter::new();
        voter.push(FaultBit::OpenCircuit.mask());
        voter.push(0x00);
        let voted = voter.push(FaultBit::OpenCircuit.mask());
        assert_ne!(voted & FaultBit::OpenCircuit.mask(), 0);
    }

    #[test]
    fn fault_from_boot_reports_without_full_window() {
        let mut voter: MajorityVoter<3> = MajorityVoter::new();
        let voted = voter.push(FaultBit::ShortCircuit.mask());
        assert_ne!(voted & FaultBit::ShortCircuit.mask(), 0);
    }

    #[test]
    fn warm_up_transient_asserts_one_cycle_then_clears() {
        let mut voter: MajorityVoter<3> = MajorityVoter::new();
        // First sample is a 1-of-1 majority, anomalous or not.
        let voted = voter.push(FaultBit::OpenCircuit.mask());
        assert_ne!(voted & FaultBit::OpenCircuit.mask(), 0);
        // A clean sample makes it 1-of-2, no longer a strict majority.
        assert_eq!(voter.push(0x00), 0x00);
        assert_eq!(voter.push(0x00), 0x00);

        // Same exposure after a reset.
        voter.reset();
        let voted = voter.push(FaultBit::ShortCircuit.mask());
        assert_ne!(voted & FaultBit::ShortCircuit.mask(), 0);
        assert_eq!(voter.push(0x00), 0x00);
    }

    #[test]
    fn bits_vote_independently() {
        let mut voter: MajorityVoter<3> = MajorityVoter::new();
        voter.push(FaultBit::LowLevel.mask() | FaultBit::OpenCircuit.mask());
        voter.push(FaultBit::LowLevel.mask());
        let voted = voter.push(FaultBit::LowLevel.mask());
        assert_eq!(voted, FaultBit::LowLevel.mask());
    }
}
