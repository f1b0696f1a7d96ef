//! Unified error types for the CarMon sender firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! top-level control loop handles one type. All variants are `Copy` and
//! allocation-free.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A received telemetry frame could not be decoded.
    Decode(DecodeError),
    /// An operator calibration entry was rejected.
    Calibration(CalibrationError),
    /// Persistent storage (NVS) failed.
    Storage(StorageError),
    /// A sensor could not be read at all.
    Sensor(SensorError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Calibration(e) => write!(f, "calibration: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Frame decode errors
// ---------------------------------------------------------------------------

/// Why a received frame was rejected.
///
/// A failed decode always means the frame is dropped; the codec never
/// retries or attempts correction. Loss shows up receiver-side as a gap
/// in the sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer length does not match the fixed frame size.
    Length { expected: usize, got: usize },
    /// Declared protocol version differs from this build's constant.
    VersionMismatch { expected: u8, got: u8 },
    /// Recomputed XOR over the received bytes differs from the trailer.
    ChecksumMismatch { expected: u8, got: u8 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length { expected, got } => {
                write!(f, "frame length {got}, expected {expected}")
            }
            Self::VersionMismatch { expected, got } => {
                write!(f, "protocol version {got}, expected {expected}")
            }
            Self::ChecksumMismatch { expected, got } => {
                write!(f, "checksum {got:#04x}, computed {expected:#04x}")
            }
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Calibration errors
// ---------------------------------------------------------------------------

/// Operator calibration input rejected. The prior persisted value is always
/// retained — no partial update occurs on rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// Entered value is outside the permitted range.
    OutOfRange {
        field: &'static str,
        min: i32,
        max: i32,
    },
    /// A session step was driven out of order (e.g. sample tick while idle).
    NotInSession,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { field, min, max } => {
                write!(f, "{field} must be between {min} and {max}")
            }
            Self::NotInSession => write!(f, "no calibration session active"),
        }
    }
}

impl From<CalibrationError> for Error {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Key does not exist in the namespace.
    NotFound,
    /// Flash read/write/commit failed.
    IoError,
    /// Stored blob could not be deserialised.
    Corrupted,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::IoError => write!(f, "flash I/O failed"),
            Self::Corrupted => write!(f, "stored record corrupted"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Hard sensor read failures. Soft out-of-range conditions are *not* errors:
/// they travel as fault bits inside the telemetry frame (see [`crate::fault`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// SPI transaction with the thermocouple converter failed.
    SpiReadFailed,
    /// Not enough samples folded in yet for a meaningful smoothed value.
    WarmingUp,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::SpiReadFailed => write!(f, "SPI read failed"),
            Self::WarmingUp => write!(f, "sensor warming up"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
