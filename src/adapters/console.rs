//! Serial console command parsers.
//!
//! Both nodes expose a line-oriented maintenance menu over the USB serial
//! port. This module is only the parsers — pure and host-testable; the
//! main loop owns the I/O and hands each complete line here. Fuel commands
//! mirror the printed menu:
//!
//! ```text
//!   1            show status and stored calibration
//!   2            start two-point calibration (empty, then full)
//!   3 e|f|<ohms> start single-point calibration
//!   4 <e> <f>    set offsets manually ('-' keeps the stored value)
//!   5 <pct>      set low-fuel warning threshold
//!   6            reset calibration to defaults
//!   q            abort the active calibration session
//!   <blank>      confirm the pending calibration prompt
//! ```
//!
//! The oil node's menu has no sampling session; every entry is a direct
//! offset or alarm-limit write (`2 <field> <value>`), see [`parse_oil_line`].

use crate::calibration::engine::OilAdjust;
use crate::calibration::ReferencePoint;

/// One parsed console line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    /// Print the live reading and stored calibration.
    Status,
    /// Begin a two-point calibration session.
    TwoPoint,
    /// Begin a single-point calibration session at the given reference.
    SinglePoint(ReferencePoint),
    /// Write offsets directly; `None` keeps the stored value.
    ManualOffsets {
        empty_ohms: Option<f32>,
        full_ohms: Option<f32>,
    },
    /// Set the low-fuel warning threshold (percent).
    SetThreshold(u8),
    /// Restore default calibration.
    ResetDefaults,
    /// Abort the active calibration session.
    Abort,
    /// Confirm the pending calibration prompt (blank line).
    Confirm,
}

/// Parse one console line. `None` means the line was not a valid command;
/// the caller re-prints the menu.
pub fn parse_line(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() {
        return Some(ConsoleCommand::Confirm);
    }

    let mut parts = line.split_ascii_whitespace();
    let head = parts.next()?;

    let cmd = match head {
        "1" | "s" => ConsoleCommand::Status,
        "2" => ConsoleCommand::TwoPoint,
        "3" => {
            let point = match parts.next()? {
                "e" => ReferencePoint::Empty,
                "f" => ReferencePoint::Full,
                other => {
                    let nominal = other.parse::<f32>().ok()?;
                    if !nominal.is_finite() {
                        return None;
                    }
                    ReferencePoint::Custom(nominal)
                }
            };
            ConsoleCommand::SinglePoint(point)
        }
        "4" => {
            let empty_ohms = parse_offset(parts.next()?)?;
            let full_ohms = parse_offset(parts.next()?)?;
            ConsoleCommand::ManualOffsets {
                empty_ohms,
                full_ohms,
            }
        }
        "5" => ConsoleCommand::SetThreshold(parts.next()?.parse::<u8>().ok()?),
        "6" => ConsoleCommand::ResetDefaults,
        "q" | "a" => ConsoleCommand::Abort,
        _ => return None,
    };

    // Trailing garbage invalidates the line rather than being ignored.
    if parts.next().is_some() {
        return None;
    }
    Some(cmd)
}

/// `'-'` keeps the stored value, anything else must parse as ohms.
fn parse_offset(token: &str) -> Option<Option<f32>> {
    if token == "-" {
        return Some(None);
    }
    let ohms = token.parse::<f32>().ok()?;
    if !ohms.is_finite() {
        return None;
    }
    Some(Some(ohms))
}

/// One parsed oil-node console line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OilCommand {
    /// Print the live readings and stored calibration.
    Status,
    /// Write one offset or alarm limit; unset fields keep stored values.
    Adjust(OilAdjust),
    /// Restore default calibration.
    ResetDefaults,
}

/// Parse one oil-node console line. `None` means the line was not a valid
/// command; the caller re-prints the menu.
///
/// Adjustment lines are `2 <field> <value>` where `<field>` selects the
/// record field: `ho`/`hl` head temp offset/alarm, `oo`/`ol` oil temp
/// offset/alarm, `po`/`pl`/`ph` pressure offset/low alarm/high alarm.
pub fn parse_oil_line(line: &str) -> Option<OilCommand> {
    let mut parts = line.trim().split_ascii_whitespace();

    let cmd = match parts.next()? {
        "1" | "s" => OilCommand::Status,
        "2" => {
            let field = parts.next()?;
            let value = parts.next()?.parse::<f32>().ok()?;
            if !value.is_finite() {
                return None;
            }
            let mut adjust = OilAdjust::default();
            match field {
                "ho" => adjust.head_temp_offset = Some(value),
                "hl" => adjust.head_temp_alarm_high = Some(value),
                "oo" => adjust.oil_temp_offset = Some(value),
                "ol" => adjust.oil_temp_alarm_high = Some(value),
                "po" => adjust.oil_press_offset = Some(value),
                "pl" => adjust.oil_press_alarm_low = Some(value),
                "ph" => adjust.oil_press_alarm_high = Some(value),
                _ => return None,
            }
            OilCommand::Adjust(adjust)
        }
        "6" => OilCommand::ResetDefaults,
        _ => return None,
    };

    if parts.next().is_some() {
        return None;
    }
    Some(cmd)
}

/// The menu text printed on boot and after an unrecognised line.
pub const MENU: &str = "\
fuel sender console:
  1            status
  2            two-point calibration
  3 e|f|<ohms> single-point calibration
  4 <e> <f>    manual offsets ('-' keeps stored)
  5 <pct>      low-fuel threshold
  6            reset to defaults
  q            abort session
  <enter>      confirm prompt";

/// Oil-node menu text, same printing rules as [`MENU`].
pub const OIL_MENU: &str = "\
oil sender console:
  1            status
  2 ho <degF>  head temp offset
  2 hl <degF>  head temp high alarm
  2 oo <degF>  oil temp offset
  2 ol <degF>  oil temp high alarm
  2 po <psi>   oil pressure offset
  2 pl <psi>   oil pressure low alarm
  2 ph <psi>   oil pressure high alarm
  6            reset to defaults";
