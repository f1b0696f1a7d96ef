//! Fuel sender node service.
//!
//! Pipeline, once per sample cadence:
//!
//! ```text
//!   ADC ─▶ divider math ─▶ EMA ─▶ gauge (offset-corrected anchors) ─▶ %
//!                │                                        │
//!                └────────▶ fault classify ─▶ majority vote
//! ```
//!
//! and once per transmit cadence the latest sample is framed and handed to
//! the transport. While a calibration session is active the session owns
//! the loop: telemetry pauses and every tick feeds the engine instead.

use log::{debug, info};

use crate::adapters::console::ConsoleCommand;
use crate::calibration::{
    engine, CalibrationEngine, FuelCalibration, FuelCalibrationStore, OperatorInput, SessionEvent,
};
use crate::conditioning::{Ema, FuelGauge};
use crate::config::FuelConfig;
use crate::error::Result;
use crate::fault::{classify, FaultThresholds, MajorityVoter};
use crate::packet::fuel::FuelFrame;
use crate::ports::{StoragePort, TransportPort};
use crate::scheduler::Cadence;
use crate::sensors::fuel_level::FuelLevelSensor;

/// Fault debounce window, in samples. Fixed at compile time because the
/// voter is stack-allocated; `FuelConfig::majority_vote_window` documents
/// the same value for operators.
pub const VOTE_WINDOW: usize = 3;

/// Result of the most recent sample cadence.
#[derive(Debug, Clone, Copy)]
pub struct FuelSample {
    /// Sender resistance as measured this cycle (Ω); NaN on read failure.
    pub raw_ohms: f32,
    /// Smoothed resistance, `None` until the smoother has warmed up.
    pub smoothed_ohms: Option<f32>,
    /// Calibrated fuel level, `None` until warm-up completes.
    pub percent: Option<f32>,
    /// Majority-voted fault mask.
    pub fault_mask: u8,
}

impl FuelSample {
    const fn empty() -> Self {
        Self {
            raw_ohms: f32::NAN,
            smoothed_ohms: None,
            percent: None,
            fault_mask: 0,
        }
    }
}

pub struct FuelNode<S: StoragePort> {
    config: FuelConfig,
    store: FuelCalibrationStore<S>,
    /// RAM copy of the persisted record; refreshed after every store write.
    calibration: FuelCalibration,
    gauge: FuelGauge,
    sensor: FuelLevelSensor,
    ema: Ema,
    voter: MajorityVoter<VOTE_WINDOW>,
    engine: CalibrationEngine,
    /// Operator event collected since the last engine tick.
    pending_input: Option<OperatorInput>,
    sample: Cadence,
    transmit: Cadence,
    display: Cadence,
    sequence: u16,
    latest: FuelSample,
}

impl<S: StoragePort> FuelNode<S> {
    pub fn new(config: FuelConfig, storage: S) -> Self {
        debug_assert_eq!(config.majority_vote_window, VOTE_WINDOW);
        let store = FuelCalibrationStore::new(storage);
        let calibration = store.load();
        let gauge = Self::build_gauge(&config, &calibration);
        if store.is_provisioned() {
            info!(
                "fuel node: offsets empty {:+.2} Ω / full {:+.2} Ω, low-fuel {}%",
                calibration.empty_ohms_offset,
                calibration.full_ohms_offset,
                calibration.low_fuel_threshold_percent
            );
        } else {
            info!("fuel node: no stored calibration, using defaults");
        }
        Self {
            sensor: FuelLevelSensor::new(config.divider_series_ohms, config.divider_vcc),
            ema: Ema::new(config.smoothing_alpha, config.min_valid_samples),
            voter: MajorityVoter::new(),
            engine: CalibrationEngine::new(
                config.empty_ohms_nominal,
                config.full_ohms_nominal,
                config.calibration_samples,
            ),
            pending_input: None,
            sample: Cadence::new(config.sample_interval_ms),
            transmit: Cadence::new(config.transmit_interval_ms),
            display: Cadence::new(config.display_interval_ms),
            sequence: 0,
            latest: FuelSample::empty(),
            store,
            calibration,
            gauge,
            config,
        }
    }

    fn build_gauge(config: &FuelConfig, calibration: &FuelCalibration) -> FuelGauge {
        FuelGauge::new(
            config.empty_ohms_nominal,
            config.full_ohms_nominal,
            calibration.empty_ohms_offset,
            calibration.full_ohms_offset,
        )
    }

    /// Re-read the persisted record and rebuild everything derived from it.
    fn refresh_calibration(&mut self) {
        self.calibration = self.store.load();
        self.gauge = Self::build_gauge(&self.config, &self.calibration);
        // Old votes were cast against the old thresholds.
        self.voter.reset();
    }

    pub fn latest(&self) -> &FuelSample {
        &self.latest
    }

    pub fn calibration(&self) -> &FuelCalibration {
        &self.calibration
    }

    pub fn calibration_active(&self) -> bool {
        self.engine.is_active()
    }

    /// Drive the node one tick. Returns the calibration session event of
    /// this tick, if one occurred.
    pub fn tick<T: TransportPort>(
        &mut self,
        now_ms: u32,
        transport: &mut T,
    ) -> Result<Option<SessionEvent>> {
        if self.engine.is_active() {
            return self.tick_calibration(now_ms);
        }

        if self.sample.due(now_ms) {
            self.sample_once();
        }

        if self.transmit.due(now_ms) {
            self.transmit_once(now_ms, transport);
        }

        if self.display.due(now_ms) {
            // Local OLED refresh; cosmetic, so just trace the state.
            debug!(
                "fuel: {:?} Ω -> {:?} % mask {:#04x}",
                self.latest.smoothed_ohms, self.latest.percent, self.latest.fault_mask
            );
        }

        Ok(None)
    }

    /// A session owns the loop: one engine tick per sample cadence.
    ///
    /// The engine gets the raw reading, not the smoothed one — the EMA lags
    /// behind a sender that was just moved to the reference position, and
    /// the engine's median already rejects outliers. The smoother keeps
    /// updating so telemetry resumes warm after the session.
    fn tick_calibration(&mut self, now_ms: u32) -> Result<Option<SessionEvent>> {
        if !self.sample.due(now_ms) {
            return Ok(None);
        }
        let raw = self.sensor.read_ohms();
        let _ = self.ema.update(raw);
        let input = self.pending_input.take();
        let event = self.engine.tick(input, raw, &mut self.store)?;
        if matches!(event, Some(SessionEvent::Committed(_)) | Some(SessionEvent::Aborted)) {
            self.refresh_calibration();
            // Restart the starved cadences from a clean phase.
            self.transmit.rearm(now_ms);
            self.display.rearm(now_ms);
        }
        Ok(event)
    }

    fn sample_once(&mut self) {
        let raw = self.sensor.read_ohms();
        let smoothed = self.ema.update(raw);
        let percent = smoothed.map(|ohms| self.gauge.percent(ohms));

        let thresholds = FaultThresholds {
            open_circuit_ohms: self.config.open_circuit_ohms,
            short_circuit_ohms: self.config.short_circuit_ohms,
            low_level_percent: f32::from(self.calibration.low_fuel_threshold_percent),
        };
        let mask = classify(raw, percent, &thresholds);
        let voted = self.voter.push(mask);

        self.latest = FuelSample {
            raw_ohms: raw,
            smoothed_ohms: smoothed,
            percent,
            fault_mask: voted,
        };
    }

    fn transmit_once<T: TransportPort>(&mut self, now_ms: u32, transport: &mut T) {
        // Withheld until warm-up: the frame has no way to mark its integer
        // fields as not-yet-valid.
        let (Some(smoothed), Some(percent)) = (self.latest.smoothed_ohms, self.latest.percent)
        else {
            debug!("fuel: smoother warming up, frame withheld");
            return;
        };

        let frame = FuelFrame {
            timestamp: now_ms,
            raw_resistance: smoothed.clamp(0.0, 65535.0) as u16,
            fuel_percent: percent.round() as u8,
            fault_status: self.latest.fault_mask,
            sequence_number: self.sequence,
        };

        // A failed send drops the frame; the sequence number still advances
        // so the receiver can count the gap.
        if transport.send(&frame.encode()).is_ok() {
            debug!("fuel: frame {} sent", self.sequence);
        }
        self.sequence = self.sequence.wrapping_add(1);
    }

    /// Apply one parsed console command. Session-flow inputs (confirm and
    /// abort) are queued for the next engine tick; everything else takes
    /// effect immediately.
    pub fn handle_command(&mut self, cmd: ConsoleCommand) -> Result<Option<SessionEvent>> {
        match cmd {
            ConsoleCommand::Status => {
                info!(
                    "fuel status: {:?} Ω, {:?} %, mask {:#04x}, cal {:?}",
                    self.latest.smoothed_ohms,
                    self.latest.percent,
                    self.latest.fault_mask,
                    self.calibration
                );
                Ok(None)
            }
            ConsoleCommand::TwoPoint => Ok(Some(self.engine.start_two_point())),
            ConsoleCommand::SinglePoint(point) => Ok(Some(self.engine.start_single_point(point))),
            ConsoleCommand::ManualOffsets {
                empty_ohms,
                full_ohms,
            } => {
                let record = engine::manual_adjust(&mut self.store, empty_ohms, full_ohms)?;
                self.refresh_calibration();
                Ok(Some(SessionEvent::Committed(record)))
            }
            ConsoleCommand::SetThreshold(percent) => {
                let record = engine::set_low_fuel_threshold(&mut self.store, percent)?;
                self.refresh_calibration();
                Ok(Some(SessionEvent::Committed(record)))
            }
            ConsoleCommand::ResetDefaults => {
                let record = self.store.reset_defaults()?;
                self.refresh_calibration();
                Ok(Some(SessionEvent::Committed(record)))
            }
            ConsoleCommand::Confirm => {
                self.pending_input = Some(OperatorInput::Confirm);
                Ok(None)
            }
            ConsoleCommand::Abort => {
                self.pending_input = Some(OperatorInput::Abort);
                Ok(None)
            }
        }
    }
}
