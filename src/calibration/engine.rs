//! Field-calibration session state machine.
//!
//! The original hardware procedure is interactive: the operator moves the
//! sender to a known reference point (empty or full tank), the node
//! averages a burst of live readings, and the difference to the nominal
//! resistance becomes the persisted offset. Here the blocking
//! wait-for-ENTER loops are modelled as an explicit state machine driven
//! once per control-loop tick:
//!
//! ```text
//!  Idle ──start──▶ AwaitingReference ──confirm──▶ Sampling (one reading
//!    ▲                                             per tick, N total)
//!    │                                                  │ median
//!    └──────────── persist via store ◀── offset = nominal − measured
//! ```
//!
//! While a session is active the node's sampling/transmission cadences
//! degrade — acceptable for a field tool, the engine never runs
//! concurrently with the telemetry pipeline.
//!
//! The median (not the mean) of the sample burst is used so one outlier
//! reading cannot skew the reference measurement.

use heapless::Vec;
use log::{info, warn};

use crate::calibration::store::{FuelCalibration, FuelCalibrationStore, OilCalibration, OilCalibrationStore};
use crate::error::{CalibrationError, Error, Result};
use crate::ports::StoragePort;

/// Upper bound on the per-reference sample burst (stack-allocated).
pub const MAX_CAL_SAMPLES: usize = 16;

// ---------------------------------------------------------------------------
// Session vocabulary
// ---------------------------------------------------------------------------

/// A known physical state the operator positions the sender at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferencePoint {
    /// Empty tank, built-in nominal resistance.
    Empty,
    /// Full tank, built-in nominal resistance.
    Full,
    /// Operator-entered nominal resistance (Ω).
    Custom(f32),
}

/// Discrete operator input, delivered at most once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatorInput {
    /// ENTER pressed — the sender is positioned at the reference point.
    Confirm,
    /// Abort the session at the next prompt.
    Abort,
}

/// What happened during this tick, for the console to render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// Waiting for the operator to position the sender and confirm.
    AwaitingReference { point: ReferencePoint, nominal_ohms: f32 },
    /// One more live reading collected.
    SamplingProgress { taken: usize, target: usize },
    /// A reference point was measured and its offset computed. For
    /// two-point sessions this fires after the empty stage while the full
    /// stage is still pending; nothing is persisted yet.
    OffsetComputed {
        point: ReferencePoint,
        measured_ohms: f32,
        offset_ohms: f32,
    },
    /// All offsets of the session were persisted together.
    Committed(FuelCalibration),
    /// Session abandoned; nothing was persisted.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Procedure {
    /// Empty then full, both offsets persisted together at the end.
    TwoPoint,
    /// One reference point, only the corresponding offset updated.
    SinglePoint,
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    AwaitingReference {
        point: ReferencePoint,
        /// Whether the prompt event for this reference has been emitted.
        /// False only between the two stages of a two-point session, where
        /// the stage-transition tick already returned `OffsetComputed`.
        prompted: bool,
    },
    Sampling {
        point: ReferencePoint,
        samples: Vec<f32, MAX_CAL_SAMPLES>,
    },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives one calibration session at a time against the fuel store.
pub struct CalibrationEngine {
    state: State,
    procedure: Procedure,
    /// Empty-stage result held until the full stage commits (two-point).
    pending_empty_offset: Option<f32>,
    sample_target: usize,
    empty_nominal_ohms: f32,
    full_nominal_ohms: f32,
}

impl CalibrationEngine {
    pub fn new(empty_nominal_ohms: f32, full_nominal_ohms: f32, sample_target: usize) -> Self {
        debug_assert!(sample_target >= 1 && sample_target <= MAX_CAL_SAMPLES);
        Self {
            state: State::Idle,
            procedure: Procedure::SinglePoint,
            pending_empty_offset: None,
            sample_target: sample_target.min(MAX_CAL_SAMPLES),
            empty_nominal_ohms,
            full_nominal_ohms,
        }
    }

    /// True while a session owns the control loop's attention.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, State::Idle)
    }

    /// Begin a two-point session (empty first, then full). Most accurate.
    pub fn start_two_point(&mut self) -> SessionEvent {
        info!("calibration: two-point session started");
        self.procedure = Procedure::TwoPoint;
        self.pending_empty_offset = None;
        self.await_reference(ReferencePoint::Empty)
    }

    /// Begin a single-point session against the given reference.
    pub fn start_single_point(&mut self, point: ReferencePoint) -> SessionEvent {
        info!("calibration: single-point session started");
        self.procedure = Procedure::SinglePoint;
        self.pending_empty_offset = None;
        self.await_reference(point)
    }

    /// Drive the session one tick.
    ///
    /// `live_ohms` is the current sender resistance reading; `input` is
    /// the operator event collected since the last tick, if any. Returns
    /// `Ok(None)` when nothing user-visible happened (idle, or waiting
    /// with no input).
    pub fn tick<S: StoragePort>(
        &mut self,
        input: Option<OperatorInput>,
        live_ohms: f32,
        store: &mut FuelCalibrationStore<S>,
    ) -> Result<Option<SessionEvent>> {
        // Abort is honoured from any non-idle state, before anything else.
        if matches!(input, Some(OperatorInput::Abort)) && self.is_active() {
            warn!("calibration: session aborted by operator");
            self.state = State::Idle;
            self.pending_empty_offset = None;
            return Ok(Some(SessionEvent::Aborted));
        }

        match &mut self.state {
            State::Idle => Ok(None),

            State::AwaitingReference { point, prompted } => {
                let point = *point;
                let needs_prompt = !*prompted;
                *prompted = true;
                match input {
                    Some(OperatorInput::Confirm) => {
                        self.state = State::Sampling {
                            point,
                            samples: Vec::new(),
                        };
                        Ok(Some(SessionEvent::SamplingProgress {
                            taken: 0,
                            target: self.sample_target,
                        }))
                    }
                    _ if needs_prompt => Ok(Some(SessionEvent::AwaitingReference {
                        point,
                        nominal_ohms: self.nominal_for(point),
                    })),
                    // Blocks indefinitely by design: no timeout on operator input.
                    _ => Ok(None),
                }
            }

            State::Sampling { point, samples } => {
                if live_ohms.is_nan() {
                    // No usable reading this tick; stay and wait for the next.
                    return Ok(Some(SessionEvent::SamplingProgress {
                        taken: samples.len(),
                        target: self.sample_target,
                    }));
                }
                // Capacity is sample_target <= MAX_CAL_SAMPLES, push cannot fail.
                let _ = samples.push(live_ohms);
                if samples.len() < self.sample_target {
                    return Ok(Some(SessionEvent::SamplingProgress {
                        taken: samples.len(),
                        target: self.sample_target,
                    }));
                }

                let point = *point;
                let measured = median(samples);
                self.finish_reference(point, measured, store)
            }
        }
    }

    // ── Internal ──────────────────────────────────────────────────

    fn await_reference(&mut self, point: ReferencePoint) -> SessionEvent {
        let nominal = self.nominal_for(point);
        self.state = State::AwaitingReference {
            point,
            prompted: true,
        };
        SessionEvent::AwaitingReference {
            point,
            nominal_ohms: nominal,
        }
    }

    fn nominal_for(&self, point: ReferencePoint) -> f32 {
        match point {
            ReferencePoint::Empty => self.empty_nominal_ohms,
            ReferencePoint::Full => self.full_nominal_ohms,
            ReferencePoint::Custom(nominal) => nominal,
        }
    }

    /// A reference burst is complete: compute the offset, then either move
    /// to the next stage (two-point after empty) or persist and go idle.
    fn finish_reference<S: StoragePort>(
        &mut self,
        point: ReferencePoint,
        measured: f32,
        store: &mut FuelCalibrationStore<S>,
    ) -> Result<Option<SessionEvent>> {
        let offset = self.nominal_for(point) - measured;
        info!(
            "calibration: reference measured {measured:.2} Ω, offset {offset:+.2} Ω"
        );

        if self.procedure == Procedure::TwoPoint && matches!(point, ReferencePoint::Empty) {
            self.pending_empty_offset = Some(offset);
            // This tick surfaces the empty-stage result; the next tick
            // emits the full-stage prompt.
            self.state = State::AwaitingReference {
                point: ReferencePoint::Full,
                prompted: false,
            };
            return Ok(Some(SessionEvent::OffsetComputed {
                point,
                measured_ohms: measured,
                offset_ohms: offset,
            }));
        }

        let mut record = store.load();
        match (self.procedure, point) {
            (Procedure::TwoPoint, ReferencePoint::Full) => {
                // Persist both offsets together, never one without the other.
                record.empty_ohms_offset = self
                    .pending_empty_offset
                    .take()
                    .ok_or(Error::Calibration(CalibrationError::NotInSession))?;
                record.full_ohms_offset = offset;
            }
            (_, ReferencePoint::Empty) => record.empty_ohms_offset = offset,
            (_, ReferencePoint::Full) => record.full_ohms_offset = offset,
            (_, ReferencePoint::Custom(nominal)) => {
                // Update whichever anchor the entered nominal is nearer to;
                // ties go to empty (the higher-resistance end).
                let to_empty = (nominal - self.empty_nominal_ohms).abs();
                let to_full = (nominal - self.full_nominal_ohms).abs();
                if to_empty <= to_full {
                    record.empty_ohms_offset = offset;
                } else {
                    record.full_ohms_offset = offset;
                }
            }
        }

        self.state = State::Idle;
        match store.save(&record) {
            Ok(()) => Ok(Some(SessionEvent::Committed(record))),
            Err(e) => {
                // Save failed: the in-memory offsets are NOT committed and
                // the operator must be told so.
                warn!("calibration: persist failed ({e}); offsets not committed");
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Direct (non-sampling) store operations
// ---------------------------------------------------------------------------

/// Manual offset adjustment: the operator supplies values directly,
/// bypassing the sampling pipeline. `None` (a blank entry) leaves the
/// existing offset unchanged — a no-op, not a reset to zero.
pub fn manual_adjust<S: StoragePort>(
    store: &mut FuelCalibrationStore<S>,
    empty_ohms_offset: Option<f32>,
    full_ohms_offset: Option<f32>,
) -> Result<FuelCalibration> {
    let mut record = store.load();
    if let Some(v) = empty_ohms_offset {
        record.empty_ohms_offset = v;
    }
    if let Some(v) = full_ohms_offset {
        record.full_ohms_offset = v;
    }
    store.save(&record)?;
    Ok(record)
}

/// Update the low-fuel warning threshold. Values outside the valid range
/// are rejected with the prior value retained.
pub fn set_low_fuel_threshold<S: StoragePort>(
    store: &mut FuelCalibrationStore<S>,
    percent: u8,
) -> Result<FuelCalibration> {
    let mut record = store.load();
    record.low_fuel_threshold_percent = percent;
    store.save(&record)?;
    Ok(record)
}

/// Blank-entry-preserving adjustment for the oil node's offsets and alarm
/// limits, same semantics as [`manual_adjust`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OilAdjust {
    pub head_temp_offset: Option<f32>,
    pub head_temp_alarm_high: Option<f32>,
    pub oil_temp_offset: Option<f32>,
    pub oil_temp_alarm_high: Option<f32>,
    pub oil_press_offset: Option<f32>,
    pub oil_press_alarm_low: Option<f32>,
    pub oil_press_alarm_high: Option<f32>,
}

/// Apply an [`OilAdjust`] through a full-record save.
pub fn manual_adjust_oil<S: StoragePort>(
    store: &mut OilCalibrationStore<S>,
    adjust: OilAdjust,
) -> Result<OilCalibration> {
    let mut record = store.load();
    if let Some(v) = adjust.head_temp_offset {
        record.head_temp_offset = v;
    }
    if let Some(v) = adjust.head_temp_alarm_high {
        record.head_temp_alarm_high = v;
    }
    if let Some(v) = adjust.oil_temp_offset {
        record.oil_temp_offset = v;
    }
    if let Some(v) = adjust.oil_temp_alarm_high {
        record.oil_temp_alarm_high = v;
    }
    if let Some(v) = adjust.oil_press_offset {
        record.oil_press_offset = v;
    }
    if let Some(v) = adjust.oil_press_alarm_low {
        record.oil_press_alarm_low = v;
    }
    if let Some(v) = adjust.oil_press_alarm_high {
        record.oil_press_alarm_high = v;
    }
    store.save(&record)?;
    Ok(record)
}

// ---------------------------------------------------------------------------
// Median
// ---------------------------------------------------------------------------

/// Median of a non-empty sample burst. Even counts average the two middle
/// values. Chosen over the mean to resist a single outlier reading.
fn median(samples: &[f32]) -> f32 {
    debug_assert!(!samples.is_empty());
    let mut sorted: Vec<f32, MAX_CAL_SAMPLES> = Vec::new();
    for &s in samples {
        let _ = sorted.push(s);
    }
    sorted.sort_unstable_by(f32::total_cmp);
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}
