//! MAX31856 thermocouple channels (cylinder head and oil).
//!
//! The SPI glue publishes each conversion — hot-junction and cold-junction
//! temperatures in °C plus the converter's raw fault register — into a
//! per-channel cell. The core converts to °F here; the calibration offset
//! is applied later, after smoothing.
//!
//! Fault register semantics pass through untouched: `0x00` nominal, the
//! MAX31856 fault bits as documented in its datasheet, and `0xFF` meaning
//! the SPI read itself failed (all-ones bus response).

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

/// Which thermocouple converter a cell belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Head,
    Oil,
}

/// One published conversion, already in °F.
#[derive(Debug, Clone, Copy)]
pub struct ThermocoupleReading {
    pub temp_f: f32,
    pub cold_junction_f: f32,
    /// Raw MAX31856 fault register; `0xFF` = read failure.
    pub fault: u8,
}

struct Cell {
    temp_c_bits: AtomicU32,
    cold_junction_c_bits: AtomicU32,
    fault: AtomicU8,
}

impl Cell {
    const fn new() -> Self {
        Self {
            temp_c_bits: AtomicU32::new(0),
            cold_junction_c_bits: AtomicU32::new(0),
            fault: AtomicU8::new(0xFF), // unread until the first publish
        }
    }
}

static HEAD: Cell = Cell::new();
static OIL: Cell = Cell::new();

fn cell(channel: Channel) -> &'static Cell {
    match channel {
        Channel::Head => &HEAD,
        Channel::Oil => &OIL,
    }
}

/// Publish one conversion from the SPI glue (or a host test).
pub fn publish(channel: Channel, temp_c: f32, cold_junction_c: f32, fault: u8) {
    let c = cell(channel);
    c.temp_c_bits.store(temp_c.to_bits(), Ordering::Relaxed);
    c.cold_junction_c_bits
        .store(cold_junction_c.to_bits(), Ordering::Relaxed);
    c.fault.store(fault, Ordering::Relaxed);
}

/// Mark a channel as unreadable (SPI transaction failed).
pub fn publish_read_failure(channel: Channel) {
    cell(channel).fault.store(0xFF, Ordering::Relaxed);
}

#[inline]
fn c_to_f(c: f32) -> f32 {
    c * 9.0 / 5.0 + 32.0
}

/// Latest reading for a channel, converted to °F.
///
/// A `0xFF` fault reports NaN temperatures: the converter produced no
/// usable value, and NaN propagates into the frame where the display unit
/// checks the fault byte first.
pub fn read(channel: Channel) -> ThermocoupleReading {
    let c = cell(channel);
    let fault = c.fault.load(Ordering::Relaxed);
    if fault == 0xFF {
        return ThermocoupleReading {
            temp_f: f32::NAN,
            cold_junction_f: f32::NAN,
            fault,
        };
    }
    ThermocoupleReading {
        temp_f: c_to_f(f32::from_bits(c.temp_c_bits.load(Ordering::Relaxed))),
        cold_junction_f: c_to_f(f32::from_bits(
            c.cold_junction_c_bits.load(Ordering::Relaxed),
        )),
        fault,
    }
}
