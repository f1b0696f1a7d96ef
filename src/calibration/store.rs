//! Persisted calibration records.
//!
//! Each node keeps one small record in NVS, one short string key per
//! field, scoped to a per-node namespace. Keys are stable across firmware
//! versions so a device upgrade never loses calibration. An absent key is
//! the documented default, never an error.
//!
//! No partial-field write API exists: every mutation goes through a
//! full-record `save`, so a power loss mid-write can lose at most the
//! fields not yet committed while the survivors stay mutually consistent
//! defaults-or-written — there is never a half-updated field.

use log::{info, warn};

use crate::error::{CalibrationError, Result, StorageError};
use crate::ports::StoragePort;

// ---------------------------------------------------------------------------
// Fuel node record
// ---------------------------------------------------------------------------

/// Namespace for the fuel sender's persisted calibration.
pub const FUEL_NAMESPACE: &str = "fuel_sender";

const KEY_EMPTY_OFFSET: &str = "empty_off";
const KEY_FULL_OFFSET: &str = "full_off";
const KEY_LOW_THRESHOLD: &str = "low_thresh";

/// Valid range for the low-fuel warning threshold (%).
pub const LOW_FUEL_THRESHOLD_MIN: u8 = 5;
pub const LOW_FUEL_THRESHOLD_MAX: u8 = 25;

/// Largest plausible offset magnitude for a 10–73 Ω sender (Ω).
const MAX_OFFSET_OHMS: f32 = 50.0;

/// Fuel sender calibration. Defaults describe an uncalibrated sender:
/// zero offsets and a 15 % low-fuel warning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelCalibration {
    /// Additive correction at the empty anchor (Ω). Default 0.0.
    pub empty_ohms_offset: f32,
    /// Additive correction at the full anchor (Ω). Default 0.0.
    pub full_ohms_offset: f32,
    /// Low-fuel warning threshold (%). Default 15, valid 5–25.
    pub low_fuel_threshold_percent: u8,
}

impl Default for FuelCalibration {
    fn default() -> Self {
        Self {
            empty_ohms_offset: 0.0,
            full_ohms_offset: 0.0,
            low_fuel_threshold_percent: 15,
        }
    }
}

impl FuelCalibration {
    fn validate(&self) -> core::result::Result<(), CalibrationError> {
        if !self.empty_ohms_offset.is_finite() || self.empty_ohms_offset.abs() > MAX_OFFSET_OHMS {
            return Err(CalibrationError::OutOfRange {
                field: "empty ohms offset",
                min: -(MAX_OFFSET_OHMS as i32),
                max: MAX_OFFSET_OHMS as i32,
            });
        }
        if !self.full_ohms_offset.is_finite() || self.full_ohms_offset.abs() > MAX_OFFSET_OHMS {
            return Err(CalibrationError::OutOfRange {
                field: "full ohms offset",
                min: -(MAX_OFFSET_OHMS as i32),
                max: MAX_OFFSET_OHMS as i32,
            });
        }
        if !(LOW_FUEL_THRESHOLD_MIN..=LOW_FUEL_THRESHOLD_MAX)
            .contains(&self.low_fuel_threshold_percent)
        {
            return Err(CalibrationError::OutOfRange {
                field: "low fuel threshold",
                min: i32::from(LOW_FUEL_THRESHOLD_MIN),
                max: i32::from(LOW_FUEL_THRESHOLD_MAX),
            });
        }
        Ok(())
    }
}

/// Fuel calibration store over any [`StoragePort`].
pub struct FuelCalibrationStore<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> FuelCalibrationStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load the record, substituting the default for any key never
    /// written. Never fails: a corrupt field logs and falls back.
    pub fn load(&self) -> FuelCalibration {
        let d = FuelCalibration::default();
        FuelCalibration {
            empty_ohms_offset: read_f32(&self.storage, FUEL_NAMESPACE, KEY_EMPTY_OFFSET)
                .unwrap_or(d.empty_ohms_offset),
            full_ohms_offset: read_f32(&self.storage, FUEL_NAMESPACE, KEY_FULL_OFFSET)
                .unwrap_or(d.full_ohms_offset),
            low_fuel_threshold_percent: read_u8(&self.storage, FUEL_NAMESPACE, KEY_LOW_THRESHOLD)
                .unwrap_or(d.low_fuel_threshold_percent),
        }
    }

    /// True once any field has been written; false on a factory-fresh
    /// device. Drives the boot log line only — `load` treats absent keys
    /// as defaults either way.
    pub fn is_provisioned(&self) -> bool {
        self.storage.exists(FUEL_NAMESPACE, KEY_EMPTY_OFFSET)
            || self.storage.exists(FUEL_NAMESPACE, KEY_FULL_OFFSET)
            || self.storage.exists(FUEL_NAMESPACE, KEY_LOW_THRESHOLD)
    }

    /// Validate and persist the full record.
    ///
    /// On any write failure the in-memory record is *not* considered
    /// committed and the operator must be told the save did not take.
    pub fn save(&mut self, record: &FuelCalibration) -> Result<()> {
        record.validate()?;
        self.storage.write(
            FUEL_NAMESPACE,
            KEY_EMPTY_OFFSET,
            &record.empty_ohms_offset.to_le_bytes(),
        )?;
        self.storage.write(
            FUEL_NAMESPACE,
            KEY_FULL_OFFSET,
            &record.full_ohms_offset.to_le_bytes(),
        )?;
        self.storage.write(
            FUEL_NAMESPACE,
            KEY_LOW_THRESHOLD,
            &[record.low_fuel_threshold_percent],
        )?;
        info!(
            "fuel calibration saved: empty {:+.2} Ω, full {:+.2} Ω, low fuel {} %",
            record.empty_ohms_offset,
            record.full_ohms_offset,
            record.low_fuel_threshold_percent
        );
        Ok(())
    }

    /// Write and persist the canonical default record in one operation.
    pub fn reset_defaults(&mut self) -> Result<FuelCalibration> {
        let record = FuelCalibration::default();
        self.save(&record)?;
        info!("fuel calibration reset to defaults");
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Oil node record
// ---------------------------------------------------------------------------

/// Namespace for the oil sender's persisted calibration.
pub const OIL_NAMESPACE: &str = "car_mon";

const KEY_HEAD_OFFSET: &str = "h_off";
const KEY_HEAD_ALARM: &str = "h_lim";
const KEY_OIL_OFFSET: &str = "o_off";
const KEY_OIL_ALARM: &str = "o_lim";
const KEY_PRESS_OFFSET: &str = "p_off";
const KEY_PRESS_ALARM_LO: &str = "p_lo_lim";
const KEY_PRESS_ALARM_HI: &str = "p_hi_lim";

/// Oil node calibration and alarm limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OilCalibration {
    /// Head thermocouple offset (°F). Default 0.0.
    pub head_temp_offset: f32,
    /// Head temperature high alarm (°F). Default 220.0.
    pub head_temp_alarm_high: f32,
    /// Oil thermocouple offset (°F). Default 0.0.
    pub oil_temp_offset: f32,
    /// Oil temperature high alarm (°F). Default 250.0.
    pub oil_temp_alarm_high: f32,
    /// Pressure sender offset (PSI). Default 0.0.
    pub oil_press_offset: f32,
    /// Pressure low alarm (PSI). Default 10.0.
    pub oil_press_alarm_low: f32,
    /// Pressure high alarm (PSI). Default 90.0.
    pub oil_press_alarm_high: f32,
}

impl Default for OilCalibration {
    fn default() -> Self {
        Self {
            head_temp_offset: 0.0,
            head_temp_alarm_high: 220.0,
            oil_temp_offset: 0.0,
            oil_temp_alarm_high: 250.0,
            oil_press_offset: 0.0,
            oil_press_alarm_low: 10.0,
            oil_press_alarm_high: 90.0,
        }
    }
}

impl OilCalibration {
    fn validate(&self) -> core::result::Result<(), CalibrationError> {
        for (field, v) in [
            ("head temp offset", self.head_temp_offset),
            ("head temp alarm", self.head_temp_alarm_high),
            ("oil temp offset", self.oil_temp_offset),
            ("oil temp alarm", self.oil_temp_alarm_high),
            ("oil pressure offset", self.oil_press_offset),
            ("oil pressure low alarm", self.oil_press_alarm_low),
            ("oil pressure high alarm", self.oil_press_alarm_high),
        ] {
            if !v.is_finite() {
                return Err(CalibrationError::OutOfRange {
                    field,
                    min: i32::MIN,
                    max: i32::MAX,
                });
            }
        }
        if self.oil_press_alarm_low >= self.oil_press_alarm_high {
            return Err(CalibrationError::OutOfRange {
                field: "oil pressure low alarm",
                min: 0,
                max: self.oil_press_alarm_high as i32,
            });
        }
        Ok(())
    }
}

/// Oil calibration store over any [`StoragePort`].
pub struct OilCalibrationStore<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> OilCalibrationStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load the record, substituting defaults for keys never written.
    pub fn load(&self) -> OilCalibration {
        let d = OilCalibration::default();
        OilCalibration {
            head_temp_offset: read_f32(&self.storage, OIL_NAMESPACE, KEY_HEAD_OFFSET)
                .unwrap_or(d.head_temp_offset),
            head_temp_alarm_high: read_f32(&self.storage, OIL_NAMESPACE, KEY_HEAD_ALARM)
                .unwrap_or(d.head_temp_alarm_high),
            oil_temp_offset: read_f32(&self.storage, OIL_NAMESPACE, KEY_OIL_OFFSET)
                .unwrap_or(d.oil_temp_offset),
            oil_temp_alarm_high: read_f32(&self.storage, OIL_NAMESPACE, KEY_OIL_ALARM)
                .unwrap_or(d.oil_temp_alarm_high),
            oil_press_offset: read_f32(&self.storage, OIL_NAMESPACE, KEY_PRESS_OFFSET)
                .unwrap_or(d.oil_press_offset),
            oil_press_alarm_low: read_f32(&self.storage, OIL_NAMESPACE, KEY_PRESS_ALARM_LO)
                .unwrap_or(d.oil_press_alarm_low),
            oil_press_alarm_high: read_f32(&self.storage, OIL_NAMESPACE, KEY_PRESS_ALARM_HI)
                .unwrap_or(d.oil_press_alarm_high),
        }
    }

    /// True once any field has been written; false on a factory-fresh
    /// device.
    pub fn is_provisioned(&self) -> bool {
        self.storage.exists(OIL_NAMESPACE, KEY_HEAD_OFFSET)
            || self.storage.exists(OIL_NAMESPACE, KEY_PRESS_OFFSET)
    }

    /// Validate and persist the full record.
    pub fn save(&mut self, record: &OilCalibration) -> Result<()> {
        record.validate()?;
        let fields: [(&str, f32); 7] = [
            (KEY_HEAD_OFFSET, record.head_temp_offset),
            (KEY_HEAD_ALARM, record.head_temp_alarm_high),
            (KEY_OIL_OFFSET, record.oil_temp_offset),
            (KEY_OIL_ALARM, record.oil_temp_alarm_high),
            (KEY_PRESS_OFFSET, record.oil_press_offset),
            (KEY_PRESS_ALARM_LO, record.oil_press_alarm_low),
            (KEY_PRESS_ALARM_HI, record.oil_press_alarm_high),
        ];
        for (key, value) in fields {
            self.storage
                .write(OIL_NAMESPACE, key, &value.to_le_bytes())?;
        }
        info!("oil calibration saved");
        Ok(())
    }

    /// Write and persist the canonical default record in one operation.
    pub fn reset_defaults(&mut self) -> Result<OilCalibration> {
        let record = OilCalibration::default();
        self.save(&record)?;
        info!("oil calibration reset to defaults");
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

fn read_f32<S: StoragePort>(storage: &S, namespace: &str, key: &str) -> Option<f32> {
    let mut buf = [0u8; 4];
    match storage.read(namespace, key, &mut buf) {
        Ok(4) => Some(f32::from_le_bytes(buf)),
        Ok(n) => {
            warn!("{namespace}/{key}: stored blob is {n} bytes, using default");
            None
        }
        Err(StorageError::NotFound) => None,
        Err(e) => {
            warn!("{namespace}/{key}: read failed ({e}), using default");
            None
        }
    }
}

fn read_u8<S: StoragePort>(storage: &S, namespace: &str, key: &str) -> Option<u8> {
    let mut buf = [0u8; 1];
    match storage.read(namespace, key, &mut buf) {
        Ok(1) => Some(buf[0]),
        Ok(n) => {
            warn!("{namespace}/{key}: stored blob is {n} bytes, using default");
            None
        }
        Err(StorageError::NotFound) => None,
        Err(e) => {
            warn!("{namespace}/{key}: read failed ({e}), using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nvs::NvsAdapter;
    use crate::error::Error;

    #[test]
    fn unwritten_store_loads_defaults() {
        let store = FuelCalibrationStore::new(NvsAdapter::new().unwrap());
        assert_eq!(store.load(), FuelCalibration::default());
    }

    #[test]
    fn provisioned_only_after_first_save() {
        let mut store = FuelCalibrationStore::new(NvsAdapter::new().unwrap());
        assert!(!store.is_provisioned());
        store.save(&FuelCalibration::default()).unwrap();
        assert!(store.is_provisioned());
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut store = FuelCalibrationStore::new(NvsAdapter::new().unwrap());
        let record = FuelCalibration {
            empty_ohms_offset: -2.0,
            full_ohms_offset: 2.0,
            low_fuel_threshold_percent: 12,
        };
        store.save(&record).unwrap();
        assert_eq!(store.load(), record);
    }

    #[test]
    fn reset_defaults_overrides_prior_state() {
        let mut store = FuelCalibrationStore::new(NvsAdapter::new().unwrap());
        store
            .save(&FuelCalibration {
                empty_ohms_offset: 4.5,
                full_ohms_offset: -1.25,
                low_fuel_threshold_percent: 20,
            })
            .unwrap();
        store.reset_defaults().unwrap();
        assert_eq!(store.load(), FuelCalibration::default());
    }

    #[test]
    fn rejects_threshold_outside_range() {
        let mut store = FuelCalibrationStore::new(NvsAdapter::new().unwrap());
        for bad in [3u8, 30] {
            let record = FuelCalibration {
                low_fuel_threshold_percent: bad,
                ..FuelCalibration::default()
            };
            assert!(matches!(
                store.save(&record),
                Err(Error::Calibration(CalibrationError::OutOfRange { .. }))
            ));
        }
        // Nothing was persisted by the rejected saves.
        assert_eq!(store.load(), FuelCalibration::default());
    }

    #[test]
    fn rejects_non_finite_offset() {
        let mut store = FuelCalibrationStore::new(NvsAdapter::new().unwrap());
        let record = FuelCalibration {
            empty_ohms_offset: f32::NAN,
            ..FuelCalibration::default()
        };
        assert!(store.save(&record).is_err());
    }

    #[test]
    fn oil_defaults_match_documented_values() {
        let d = OilCalibration::default();
        assert_eq!(d.head_temp_alarm_high, 220.0);
        assert_eq!(d.oil_temp_alarm_high, 250.0);
        assert_eq!(d.oil_press_alarm_low, 10.0);
        assert_eq!(d.oil_press_alarm_high, 90.0);
    }

    #[test]
    fn oil_round_trip_and_reset() {
        let mut store = OilCalibrationStore::new(NvsAdapter::new().unwrap());
        let record = OilCalibration {
            head_temp_offset: 3.5,
            oil_press_alarm_low: 12.0,
            ..OilCalibration::default()
        };
        store.save(&record).unwrap();
        assert_eq!(store.load(), record);

        store.reset_defaults().unwrap();
        assert_eq!(store.load(), OilCalibration::default());
    }

    #[test]
    fn oil_rejects_inverted_pressure_alarms() {
        let mut store = OilCalibrationStore::new(NvsAdapter::new().unwrap());
        let record = OilCalibration {
            oil_press_alarm_low: 95.0,
            ..OilCalibration::default()
        };
        assert!(store.save(&record).is_err());
    }
}
