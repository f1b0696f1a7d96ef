//! Oil pressure sender, read as a divider-scaled voltage via the ADS1115.
//!
//! The I2C glue publishes the measured voltage; the linear map to PSI and
//! the calibration offset belong to the conditioning pipeline, not here.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

static VOLTS_BITS: AtomicU32 = AtomicU32::new(0);
static READ_FAILED: AtomicBool = AtomicBool::new(true); // unread until first publish

/// Publish one voltage conversion from the I2C glue (or a host test).
pub fn publish_volts(volts: f32) {
    VOLTS_BITS.store(volts.to_bits(), Ordering::Relaxed);
    READ_FAILED.store(false, Ordering::Relaxed);
}

/// Mark the converter as unreadable until the next successful conversion.
pub fn publish_read_failure() {
    READ_FAILED.store(true, Ordering::Relaxed);
}

/// Latest sender voltage (V); NaN when the converter could not be read.
pub fn read_volts() -> f32 {
    if READ_FAILED.load(Ordering::Relaxed) {
        return f32::NAN;
    }
    f32::from_bits(VOLTS_BITS.load(Ordering::Relaxed))
}
