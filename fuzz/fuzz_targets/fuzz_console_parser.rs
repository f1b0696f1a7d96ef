//! Fuzz target: serial console line parser
//!
//! The parser faces raw operator input over USB serial; it must never
//! panic and must never produce a non-finite manual offset or custom
//! reference.
//!
//! cargo fuzz run fuzz_console_parser

#![no_main]

use carmon::adapters::console::{parse_line, ConsoleCommand};
use carmon::calibration::ReferencePoint;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = core::str::from_utf8(data) else {
        return;
    };

    match parse_line(line) {
        Some(ConsoleCommand::ManualOffsets {
            empty_ohms,
            full_ohms,
        }) => {
            assert!(empty_ohms.map_or(true, f32::is_finite));
            assert!(full_ohms.map_or(true, f32::is_finite));
        }
        Some(ConsoleCommand::SinglePoint(ReferencePoint::Custom(nominal))) => {
            assert!(nominal.is_finite());
        }
        _ => {}
    }
});
