//! Oil temperature/pressure sender telemetry frame (protocol version 3).
//!
//! Wire layout, little-endian, 32 bytes, no padding:
//!
//! ```text
//!  off  width  field
//!   0     1    version            u8 = 3
//!   1     4    timestamp          u32, ms since boot
//!   5     4    head_temp          f32, °F
//!   9     4    head_cold_junction f32, °F
//!  13     1    head_fault         u8, MAX31856 fault register
//!  14     4    oil_temp           f32, °F
//!  18     4    oil_cold_junction  f32, °F
//!  22     1    oil_fault          u8, MAX31856 fault register
//!  23     4    oil_pressure       f32, PSI
//!  27     1    sensors_status     u8, bit0=head bit1=oil temp bit2=pressure
//!  28     2    sequence_number    u16
//!  30     1    battery_level      u8, 0–100 %
//!  31     1    checksum           u8, XOR of bytes 0..31
//! ```
//!
//! The thermocouple fault registers pass through raw from the converter
//! (`0x00` nominal, `0xFF` read failure); `sensors_status` is the
//! per-channel summary set by the fault detector, one bit per channel,
//! bit set = channel faulted. This frame format is versioned independently
//! of the fuel frame and shares no fault-bit schema with it.

use crate::error::DecodeError;
use crate::packet::{MAX_ESPNOW_PAYLOAD, read_f32, read_u16, read_u32, xor_checksum};

/// Protocol version transmitted by the oil sender.
pub const OIL_PROTOCOL_VERSION: u8 = 3;

/// Serialised frame size in bytes.
pub const OIL_FRAME_SIZE: usize = 32;

const CHECKSUM_OFFSET: usize = 31;

const _: () = assert!(
    OIL_FRAME_SIZE < MAX_ESPNOW_PAYLOAD,
    "oil frame exceeds ESP-NOW max payload"
);

/// Per-channel bits of `sensors_status`.
pub const STATUS_HEAD_TEMP: u8 = 0b0000_0001;
pub const STATUS_OIL_TEMP: u8 = 0b0000_0010;
pub const STATUS_OIL_PRESSURE: u8 = 0b0000_0100;

/// One oil-node telemetry message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OilFrame {
    /// Milliseconds since node boot (monotonic, not wall-clock).
    pub timestamp: u32,
    /// Cylinder-head temperature (°F), offset-corrected.
    pub head_temp: f32,
    /// Head thermocouple cold-junction temperature (°F).
    pub head_cold_junction: f32,
    /// Head MAX31856 fault register, raw.
    pub head_fault: u8,
    /// Oil temperature (°F), offset-corrected.
    pub oil_temp: f32,
    /// Oil thermocouple cold-junction temperature (°F).
    pub oil_cold_junction: f32,
    /// Oil MAX31856 fault register, raw.
    pub oil_fault: u8,
    /// Oil pressure (PSI), offset-corrected.
    pub oil_pressure: f32,
    /// Per-channel fault summary bitmask.
    pub sensors_status: u8,
    /// Increments by exactly 1 per transmitted frame, wraps at 65536.
    pub sequence_number: u16,
    /// Supply battery estimate, 0–100 %.
    pub battery_level: u8,
}

impl OilFrame {
    /// Serialise into the fixed wire layout, computing the checksum.
    pub fn encode(&self) -> [u8; OIL_FRAME_SIZE] {
        let mut buf = [0u8; OIL_FRAME_SIZE];
        buf[0] = OIL_PROTOCOL_VERSION;
        buf[1..5].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[5..9].copy_from_slice(&self.head_temp.to_le_bytes());
        buf[9..13].copy_from_slice(&self.head_cold_junction.to_le_bytes());
        buf[13] = self.head_fault;
        buf[14..18].copy_from_slice(&self.oil_temp.to_le_bytes());
        buf[18..22].copy_from_slice(&self.oil_cold_junction.to_le_bytes());
        buf[22] = self.oil_fault;
        buf[23..27].copy_from_slice(&self.oil_pressure.to_le_bytes());
        buf[27] = self.sensors_status;
        buf[28..30].copy_from_slice(&self.sequence_number.to_le_bytes());
        buf[30] = self.battery_level;
        buf[CHECKSUM_OFFSET] = xor_checksum(&buf[..CHECKSUM_OFFSET]);
        buf
    }

    /// Validate and deserialise a received buffer. Pure; a failed decode
    /// means the frame is dropped, never retried.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != OIL_FRAME_SIZE {
            return Err(DecodeError::Length {
                expected: OIL_FRAME_SIZE,
                got: bytes.len(),
            });
        }
        if bytes[0] != OIL_PROTOCOL_VERSION {
            return Err(DecodeError::VersionMismatch {
                expected: OIL_PROTOCOL_VERSION,
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
            head_temp: read_f32(bytes, 5),
            head_cold_junction: read_f32(bytes, 9),
            head_fault: bytes[13],
            oil_temp: read_f32(bytes, 14),
            oil_cold_junction: read_f32(bytes, 18),
            oil_fault: bytes[22],
            oil_pressure: read_f32(bytes, 23),
            sensors_status: bytes[27],
            sequence_number: read_u16(bytes, 28),
            battery_level: bytes[30],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OilFrame {
        OilFrame {
            timestamp: 42_000,
            head_temp: 212.5,
            head_cold_junction: 75.0,
            head_fault: 0x00,
            oil_temp: 180.25,
            oil_cold_junction: 74.5,
            oil_fault: 0x00,
            oil_pressure: 38.0,
            sensors_status: 0x00,
            sequence_number: 17,
            battery_level: 0,
        }
    }

    #[test]
    fn round_trip_identity() {
        let frame = sample();
        let decoded = OilFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn rejects_wrong_length() {
        let bytes = sample().encode();
        assert!(matches!(
            OilFrame::decode(&bytes[..16]),
            Err(DecodeError::Length { .. })
        ));
    }

    #[test]
    fn rejects_fuel_frame_version() {
        let mut bytes = sample().encode();
        bytes[0] = 1;
        assert!(matches!(
            OilFrame::decode(&bytes),
            Err(DecodeError::VersionMismatch { expected: 3, got: 1 })
        ));
    }

    #[test]
    fn rejects_single_bit_corruption_in_float_field() {
        let mut bytes = sample().encode();
        bytes[25] ^= 0x10; // inside oil_pressure
        assert!(matches!(
            OilFrame::decode(&bytes),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn fault_registers_pass_through() {
        let frame = OilFrame {
            head_fault: 0xFF, // read failure marker
            oil_fault: 0x01,  // open thermocouple
            sensors_status: STATUS_HEAD_TEMP | STATUS_OIL_TEMP,
            ..sample()
        };
        let decoded = OilFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.head_fault, 0xFF);
        assert_eq!(decoded.oil_fault, 0x01);
        assert_eq!(decoded.sensors_status, 0x03);
    }
}
