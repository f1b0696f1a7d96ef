//! Telemetry frame codecs.
//!
//! One fixed, byte-exact wire layout per node type, serialised field by
//! field — the layout is a documented contract, not an artifact of struct
//! memory layout. The two formats are versioned independently: the fuel
//! frame and the oil frame evolved separately and do not share a fault-bit
//! schema.
//!
//! Integrity is an 8-bit XOR over every byte preceding the checksum field.
//! XOR detects every single-bit error; multi-bit corruption slips through
//! in ~1/256 of cases. That residual weakness is documented and accepted —
//! the frames are short, the link is short-range, and the receiver also
//! sanity-checks the sequence number.

pub mod fuel;
pub mod oil;

pub use fuel::FuelFrame;
pub use oil::OilFrame;

/// Hard ceiling on any frame size: conservative ESP-NOW v1.0 payload limit.
pub const MAX_ESPNOW_PAYLOAD: usize = 250;

/// XOR of every byte in `bytes`. Associative, so the only requirement is
/// that every byte is folded in exactly once.
#[inline]
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

// Infallible little-endian field readers. Callers have already verified
// the buffer length, so plain indexing is in bounds.

#[inline]
pub(crate) fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

#[inline]
pub(crate) fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

#[inline]
pub(crate) fn read_f32(buf: &[u8], off: usize) -> f32 {
    f32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}
