//! Oil temperature/pressure sender node service.
//!
//! Three channels: cylinder-head thermocouple, oil thermocouple and the
//! oil pressure sender. Each temperature channel smooths the converted °F
//! reading then applies its persisted offset; pressure smooths the raw
//! divider voltage, maps it to PSI and applies its offset. Unlike the fuel
//! frame, the oil frame transmits from the very first sample: invalid
//! channels carry NaN and are flagged in the status byte.

use log::{debug, info, warn};

use crate::adapters::console::OilCommand;
use crate::calibration::{OilCalibration, OilCalibrationStore};
use crate::calibration::engine::{manual_adjust_oil, OilAdjust};
use crate::conditioning::{apply_offset, Ema, LinearMap};
use crate::config::OilConfig;
use crate::error::Result;
use crate::packet::oil::{
    OilFrame, STATUS_HEAD_TEMP, STATUS_OIL_PRESSURE, STATUS_OIL_TEMP,
};
use crate::ports::{StoragePort, TransportPort};
use crate::scheduler::Cadence;
use crate::sensors::{pressure, thermocouple, thermocouple::Channel};

/// One conditioned temperature channel.
#[derive(Debug, Clone, Copy)]
struct TempChannel {
    ema: Ema,
    /// Raw MAX31856 fault register from the latest conversion.
    fault: u8,
    cold_junction_f: f32,
}

impl TempChannel {
    fn new(config: &OilConfig) -> Self {
        Self {
            ema: Ema::new(config.smoothing_alpha, config.min_valid_samples),
            fault: 0xFF,
            cold_junction_f: f32::NAN,
        }
    }

    /// Fold in one conversion; returns the smoothed reading if warm.
    fn update(&mut self, reading: thermocouple::ThermocoupleReading) -> Option<f32> {
        self.fault = reading.fault;
        self.cold_junction_f = reading.cold_junction_f;
        self.ema.update(reading.temp_f)
    }
}

/// Result of the most recent sample cadence, offsets applied.
#[derive(Debug, Clone, Copy)]
pub struct OilSample {
    pub head_temp_f: Option<f32>,
    pub oil_temp_f: Option<f32>,
    pub oil_pressure_psi: Option<f32>,
    pub sensors_status: u8,
}

impl OilSample {
    const fn empty() -> Self {
        Self {
            head_temp_f: None,
            oil_temp_f: None,
            oil_pressure_psi: None,
            sensors_status: STATUS_HEAD_TEMP | STATUS_OIL_TEMP | STATUS_OIL_PRESSURE,
        }
    }
}

/// Alarm evaluation against the persisted limits; rendered locally, never
/// transmitted (the display unit derives its own from the frame).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OilAlarms {
    pub head_temp_high: bool,
    pub oil_temp_high: bool,
    pub oil_press_low: bool,
    pub oil_press_high: bool,
}

pub struct OilNode<S: StoragePort> {
    config: OilConfig,
    store: OilCalibrationStore<S>,
    calibration: OilCalibration,
    pressure_map: LinearMap,
    head: TempChannel,
    oil: TempChannel,
    pressure_ema: Ema,
    sample: Cadence,
    transmit: Cadence,
    display: Cadence,
    sequence: u16,
    battery_percent: u8,
    latest: OilSample,
}

impl<S: StoragePort> OilNode<S> {
    pub fn new(config: OilConfig, storage: S) -> Self {
        let store = OilCalibrationStore::new(storage);
        let calibration = store.load();
        if store.is_provisioned() {
            info!(
                "oil node: offsets head {:+.1} / oil {:+.1} °F, press {:+.1} PSI",
                calibration.head_temp_offset,
                calibration.oil_temp_offset,
                calibration.oil_press_offset
            );
        } else {
            info!("oil node: no stored calibration, using defaults");
        }
        Self {
            pressure_map: LinearMap::new(
                config.pressure_min_volts,
                config.pressure_max_volts,
                config.pressure_full_scale_psi,
            ),
            head: TempChannel::new(&config),
            oil: TempChannel::new(&config),
            pressure_ema: Ema::new(config.smoothing_alpha, config.min_valid_samples),
            sample: Cadence::new(config.sample_interval_ms),
            transmit: Cadence::new(config.transmit_interval_ms),
            display: Cadence::new(config.display_interval_ms),
            sequence: 0,
            battery_percent: 100,
            latest: OilSample::empty(),
            store,
            calibration,
            config,
        }
    }

    pub fn latest(&self) -> &OilSample {
        &self.latest
    }

    pub fn calibration(&self) -> &OilCalibration {
        &self.calibration
    }

    /// Latest supply-battery estimate, carried verbatim in the frame.
    pub fn set_battery_percent(&mut self, percent: u8) {
        self.battery_percent = percent.min(100);
    }

    /// Apply a blank-preserving offset/limit adjustment and persist it.
    pub fn adjust(&mut self, adjust: OilAdjust) -> Result<OilCalibration> {
        let record = manual_adjust_oil(&mut self.store, adjust)?;
        self.calibration = record;
        Ok(record)
    }

    pub fn reset_defaults(&mut self) -> Result<OilCalibration> {
        let record = self.store.reset_defaults()?;
        self.calibration = record;
        Ok(record)
    }

    /// Apply one parsed console command.
    pub fn handle_command(&mut self, command: OilCommand) -> Result<()> {
        match command {
            OilCommand::Status => {
                info!(
                    "oil status: {:?} calibration {:?}",
                    self.latest, self.calibration
                );
            }
            OilCommand::Adjust(adjust) => {
                let record = self.adjust(adjust)?;
                info!("oil calibration updated: {record:?}");
            }
            OilCommand::ResetDefaults => {
                let record = self.reset_defaults()?;
                info!("oil calibration reset: {record:?}");
            }
        }
        Ok(())
    }

    /// Drive the node one tick.
    pub fn tick<T: TransportPort>(&mut self, now_ms: u32, transport: &mut T) -> Result<()> {
        if self.sample.due(now_ms) {
            self.sample_once();
        }
        if self.transmit.due(now_ms) {
            self.transmit_once(now_ms, transport);
        }
        if self.display.due(now_ms) {
            let alarms = self.alarms();
            if alarms != OilAlarms::default() {
                warn!("oil alarms: {alarms:?}");
            }
            debug!(
                "oil: head {:?} oil {:?} press {:?} status {:#04x}",
                self.latest.head_temp_f,
                self.latest.oil_temp_f,
                self.latest.oil_pressure_psi,
                self.latest.sensors_status
            );
        }
        Ok(())
    }

    fn sample_once(&mut self) {
        let head_smoothed = self.head.update(thermocouple::read(Channel::Head));
        let oil_smoothed = self.oil.update(thermocouple::read(Channel::Oil));
        let volts = pressure::read_volts();
        let press_smoothed = self.pressure_ema.update(volts);

        let head_temp_f =
            head_smoothed.map(|t| apply_offset(t, self.calibration.head_temp_offset));
        let oil_temp_f = oil_smoothed.map(|t| apply_offset(t, self.calibration.oil_temp_offset));
        let oil_pressure_psi = press_smoothed
            .map(|v| apply_offset(self.pressure_map.map(v), self.calibration.oil_press_offset));

        let mut status = 0u8;
        if self.head.fault != 0 || head_temp_f.is_none() {
            status |= STATUS_HEAD_TEMP;
        }
        if self.oil.fault != 0 || oil_temp_f.is_none() {
            status |= STATUS_OIL_TEMP;
        }
        if volts.is_nan() || oil_pressure_psi.is_none() {
            status |= STATUS_OIL_PRESSURE;
        }

        self.latest = OilSample {
            head_temp_f,
            oil_temp_f,
            oil_pressure_psi,
            sensors_status: status,
        };
    }

    fn transmit_once<T: TransportPort>(&mut self, now_ms: u32, transport: &mut T) {
        let frame = OilFrame {
            timestamp: now_ms,
            head_temp: self.latest.head_temp_f.unwrap_or(f32::NAN),
            head_cold_junction: self.head.cold_junction_f,
            head_fault: self.head.fault,
            oil_temp: self.latest.oil_temp_f.unwrap_or(f32::NAN),
            oil_cold_junction: self.oil.cold_junction_f,
            oil_fault: self.oil.fault,
            oil_pressure: self.latest.oil_pressure_psi.unwrap_or(f32::NAN),
            sensors_status: self.latest.sensors_status,
            sequence_number: self.sequence,
            battery_level: self.battery_percent,
        };

        if transport.send(&frame.encode()).is_ok() {
            debug!("oil: frame {} sent", self.sequence);
        }
        self.sequence = self.sequence.wrapping_add(1);
    }

    /// Evaluate the persisted alarm limits against the latest sample.
    /// Channels without a valid reading never alarm; their status bit is
    /// the signal instead.
    pub fn alarms(&self) -> OilAlarms {
        OilAlarms {
            head_temp_high: self
                .latest
                .head_temp_f
                .is_some_and(|t| t > self.calibration.head_temp_alarm_high),
            oil_temp_high: self
                .latest
                .oil_temp_f
                .is_some_and(|t| t > self.calibration.oil_temp_alarm_high),
            oil_press_low: self
                .latest
                .oil_pressure_psi
                .is_some_and(|p| p < self.calibration.oil_press_alarm_low),
            oil_press_high: self
                .latest
                .oil_pressure_psi
                .is_some_and(|p| p > self.calibration.oil_press_alarm_high),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::espnow::CaptureTransport;
    use crate::adapters::nvs::NvsAdapter;
    use crate::sensors::thermocouple::Channel;

    fn node() -> OilNode<NvsAdapter> {
        OilNode::new(OilConfig::default(), NvsAdapter::new().unwrap())
    }

    fn publish_nominal() {
        // 180 °F oil, 250 °F head (in °C at the converter), mid pressure.
        thermocouple::publish(Channel::Head, 121.1, 25.0, 0x00);
        thermocouple::publish(Channel::Oil, 82.2, 25.0, 0x00);
        pressure::publish_volts(1.70); // ~49.8 PSI
    }

    fn run(node: &mut OilNode<NvsAdapter>, t: &mut CaptureTransport, start_ms: u32, n: u32) -> u32 {
        let step = node.config.sample_interval_ms;
        let mut now = start_ms;
        for _ in 0..n {
            node.tick(now, t).unwrap();
            now += step;
        }
        now
    }

    #[test]
    fn first_frame_flags_warming_channels() {
        let _cells = crate::sensors::testlock::hold();
        publish_nominal();
        let mut n = node();
        let mut t = CaptureTransport::new();

        // One sample taken; smoothing not yet warm, frame still sent.
        n.tick(0, &mut t).unwrap();
        assert_eq!(t.sent().len(), 1);
        let frame = OilFrame::decode(&t.sent()[0]).unwrap();
        assert_ne!(frame.sensors_status & STATUS_HEAD_TEMP, 0);
        assert!(frame.head_temp.is_nan());
        assert_eq!(frame.head_fault, 0x00);
    }

    #[test]
    fn warm_pipeline_reports_conditioned_values() {
        let _cells = crate::sensors::testlock::hold();
        publish_nominal();
        let mut n = node();
        let mut t = CaptureTransport::new();
        run(&mut n, &mut t, 0, 8);

        let frame = OilFrame::decode(t.sent().last().unwrap()).unwrap();
        assert_eq!(frame.sensors_status, 0x00);
        assert!((frame.head_temp - 250.0).abs() < 1.0, "head {}", frame.head_temp);
        assert!((frame.oil_temp - 180.0).abs() < 1.0);
        assert!((frame.oil_pressure - 49.8).abs() < 1.0);
        assert_eq!(frame.battery_level, 100);
    }

    #[test]
    fn thermocouple_fault_sets_status_bit_but_keeps_transmitting() {
        let _cells = crate::sensors::testlock::hold();
        publish_nominal();
        let mut n = node();
        let mut t = CaptureTransport::new();
        let now = run(&mut n, &mut t, 0, 6);

        thermocouple::publish_read_failure(Channel::Oil);
        t.clear();
        run(&mut n, &mut t, now, 3);
        let frame = OilFrame::decode(t.sent().last().unwrap()).unwrap();
        assert_ne!(frame.sensors_status & STATUS_OIL_TEMP, 0);
        assert_eq!(frame.oil_fault, 0xFF);
        // Other channels unaffected.
        assert_eq!(frame.sensors_status & STATUS_HEAD_TEMP, 0);
        assert!(!frame.head_temp.is_nan());
    }

    #[test]
    fn offsets_shift_conditioned_values() {
        let _cells = crate::sensors::testlock::hold();
        publish_nominal();
        let mut n = node();
        n.adjust(OilAdjust {
            oil_temp_offset: Some(5.0),
            ..OilAdjust::default()
        })
        .unwrap();
        let mut t = CaptureTransport::new();
        run(&mut n, &mut t, 0, 8);

        let frame = OilFrame::decode(t.sent().last().unwrap()).unwrap();
        assert!((frame.oil_temp - 185.0).abs() < 1.0);
    }

    #[test]
    fn console_line_adjusts_alarm_limit_and_persists() {
        let _cells = crate::sensors::testlock::hold();
        publish_nominal();
        let mut n = node();

        let cmd = crate::adapters::console::parse_oil_line("2 ol 175").unwrap();
        n.handle_command(cmd).unwrap();
        assert_eq!(n.calibration().oil_temp_alarm_high, 175.0);

        // 180 °F oil now trips the lowered limit.
        let mut t = CaptureTransport::new();
        run(&mut n, &mut t, 0, 8);
        assert!(n.alarms().oil_temp_high);

        // The write went through the store, not just the cached record.
        let cmd = crate::adapters::console::parse_oil_line("6").unwrap();
        n.handle_command(cmd).unwrap();
        assert_eq!(n.calibration().oil_temp_alarm_high, 250.0);
    }

    #[test]
    fn alarms_fire_only_on_valid_channels() {
        let _cells = crate::sensors::testlock::hold();
        // Default limits: head high 220 °F, oil high 250 °F, press 10–90 PSI.
        thermocouple::publish(Channel::Head, 110.0, 25.0, 0x00); // 230 °F
        thermocouple::publish(Channel::Oil, 82.2, 25.0, 0x00); // 180 °F
        pressure::publish_volts(0.40); // ~2 PSI, under the 10 PSI limit
        let mut n = node();
        let mut t = CaptureTransport::new();
        run(&mut n, &mut t, 0, 8);

        let alarms = n.alarms();
        assert!(alarms.head_temp_high);
        assert!(!alarms.oil_temp_high);
        assert!(alarms.oil_press_low);
        assert!(!alarms.oil_press_high);

        // Kill the pressure channel; its alarm must clear.
        pressure::publish_read_failure();
        run(&mut n, &mut t, 100_000, 4);
        assert!(!n.alarms().oil_press_low);
    }
}
