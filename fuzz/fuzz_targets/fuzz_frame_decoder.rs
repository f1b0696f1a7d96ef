//! Fuzz target: telemetry frame decoders
//!
//! Drives arbitrary byte sequences into both frame decoders and asserts
//! that they never panic, and that anything they accept re-encodes to a
//! buffer that decodes to the same frame (the wire layout is a bijection
//! on the accepted set, modulo the fuel frame's reserved trailer).
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use carmon::packet::fuel::FuelFrame;
use carmon::packet::oil::OilFrame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = FuelFrame::decode(data) {
        let reencoded = frame.encode();
        assert_eq!(FuelFrame::decode(&reencoded), Ok(frame));
    }

    if let Ok(frame) = OilFrame::decode(data) {
        let reencoded = frame.encode();
        let again = OilFrame::decode(&reencoded).expect("re-encoded frame must decode");
        // f32 fields compare bitwise so NaN payloads round-trip too.
        assert_eq!(again.head_temp.to_bits(), frame.head_temp.to_bits());
        assert_eq!(again.oil_temp.to_bits(), frame.oil_temp.to_bits());
        assert_eq!(again.oil_pressure.to_bits(), frame.oil_pressure.to_bits());
        assert_eq!(again.sequence_number, frame.sequence_number);
        assert_eq!(again.sensors_status, frame.sensors_status);
    }
});
