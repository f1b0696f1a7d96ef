//! Fuel sender telemetry frame (protocol version 1).
//!
//! Wire layout, little-endian, 13 bytes, no padding:
//!
//! ```text
//! ┌────────┬───────────┬──────────────┬─────────┬───────┬─────────┬─────┬──────────┐
//! │ version│ timestamp │ raw_resist.  │ percent │ fault │ sequence│ cks │ reserved │
//! │  u8=1  │  u32      │  u16 (Ω)     │  u8     │  u8   │  u16    │ u8  │  u8      │
//! └────────┴───────────┴──────────────┴─────────┴───────┴─────────┴─────┴──────────┘
//!   0        1..5        5..7           7         8       9..11     11    12
//! ```
//!
//! The checksum is the XOR of bytes 0..11 (everything preceding it). The
//! trailing reserved byte exists for future expansion and is excluded.
//! Both ends must decode with this identical layout — it is the wire
//! contract with the display unit.

use crate::error::DecodeError;
use crate::packet::{MAX_ESPNOW_PAYLOAD, read_u16, read_u32, xor_checksum};

/// Protocol version transmitted by the fuel sender.
pub const FUEL_PROTOCOL_VERSION: u8 = 1;

/// Serialised frame size in bytes.
pub const FUEL_FRAME_SIZE: usize = 13;

const CHECKSUM_OFFSET: usize = 11;

const _: () = assert!(
    FUEL_FRAME_SIZE < MAX_ESPNOW_PAYLOAD,
    "fuel frame exceeds ESP-NOW max payload"
);

/// One fuel-node telemetry message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuelFrame {
    /// Milliseconds since node boot (monotonic, not wall-clock).
    pub timestamp: u32,
    /// Raw smoothed sender resistance in whole ohms.
    pub raw_resistance: u16,
    /// Calculated fuel level 0–100 %.
    pub fuel_percent: u8,
    /// Fault bitmask, see [`crate::fault::FaultBit`].
    pub fault_status: u8,
    /// Increments by exactly 1 per transmitted frame, wraps at 65536.
    pub sequence_number: u16,
}

impl FuelFrame {
    /// Serialise into the fixed wire layout, computing the checksum.
    pub fn encode(&self) -> [u8; FUEL_FRAME_SIZE] {
        let mut buf = [0u8; FUEL_FRAME_SIZE];
        buf[0] = FUEL_PROTOCOL_VERSION;
        buf[1..5].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[5..7].copy_from_slice(&self.raw_resistance.to_le_bytes());
        buf[7] = self.fuel_percent;
        buf[8] = self.fault_status;
        buf[9..11].copy_from_slice(&self.sequence_number.to_le_bytes());
        buf[CHECKSUM_OFFSET] = xor_checksum(&buf[..CHECKSUM_OFFSET]);
        // buf[12] stays 0 (reserved).
        buf
    }

    /// Validate and deserialise a received buffer.
    ///
    /// Pure function of the bytes: no state is touched, nothing is
    /// retried. Version is checked before the checksum so a frame from a
    /// newer sender is reported as a version problem, not as corruption.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != FUEL_FRAME_SIZE {
            return Err(DecodeError::Length {
                expected: FUEL_FRAME_SIZE,
                got: bytes.len(),
            });
        }
        if bytes[0] != FUEL_PROTOCOL_VERSION {
            return Err(DecodeError::VersionMismatch {
                expected: FUEL_PROTOCOL_VERSION,
                got: bytes[0],
            });
        }
        let computed = xor_checksum(&bytes[..CHECKSUM_OFFSET]);
        if computed != bytes[CHECKSUM_OFFSET] {
            return Err(DecodeError::ChecksumMismatch {
                expected: computed,
                got: bytes[CHECKSUM_OFFSET],
            });
        }

        Ok(Self {
            timestamp: read_u32(bytes, 1),
            raw_resistance: read_u16(bytes, 5),
            fuel_percent: bytes[7],
            fault_status: bytes[8],
            sequence_number: read_u16(bytes, 9),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FuelFrame {
        FuelFrame {
            timestamp: 123_456,
            raw_resistance: 42,
            fuel_percent: 55,
            fault_status: 0x08,
            sequence_number: 9_001,
        }
    }

    #[test]
    fn round_trip_identity() {
        let frame = sample();
        let decoded = FuelFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn rejects_wrong_length() {
        let bytes = sample().encode();
        assert!(matches!(
            FuelFrame::decode(&bytes[..FUEL_FRAME_SIZE - 1]),
            Err(DecodeError::Length { .. })
        ));
    }

    #[test]
    fn rejects_version_mismatch() {
        let mut bytes = sample().encode();
        bytes[0] = 2;
        assert!(matches!(
            FuelFrame::decode(&bytes),
            Err(DecodeError::VersionMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn rejects_corrupted_payload() {
        let mut bytes = sample().encode();
        bytes[7] ^= 0x01; // flip one bit of fuel_percent
        assert!(matches!(
            FuelFrame::decode(&bytes),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let mut bytes = sample().encode();
        bytes[11] ^= 0x80;
        assert!(matches!(
            FuelFrame::decode(&bytes),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn reserved_byte_not_checksummed() {
        // Corruption of the reserved trailer must not invalidate the frame.
        let mut bytes = sample().encode();
        bytes[12] = 0xAB;
        assert!(FuelFrame::decode(&bytes).is_ok());
    }

    #[test]
    fn sequence_wraps() {
        let frame = FuelFrame {
            sequence_number: u16::MAX,
            ..sample()
        };
        let decoded = FuelFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.sequence_number, u16::MAX);
        assert_eq!(decoded.sequence_number.wrapping_add(1), 0);
    }
}
