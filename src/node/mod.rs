//! Node services: the per-role control loops that tie sensors,
//! conditioning, fault detection, calibration and the transport together.
//!
//! Each sender image runs exactly one service, selected by cargo feature
//! (`node-fuel` or `node-oil`). A service is tick-driven: the main loop
//! calls `tick(now_ms, transport)` as fast as it likes and the service
//! gates its own work on [`crate::scheduler::Cadence`]s, so the loop never
//! sleeps inside the domain code.
//!
//! Transmit gating differs between the two frames. The fuel frame carries
//! integer fields only, so it is withheld entirely until the smoother has
//! warmed up. The oil frame carries f32 channels plus a per-channel status
//! byte, so it transmits from the first sample with not-yet-valid channels
//! flagged (and NaN in their value fields).

pub mod fuel;
pub mod oil;

pub use fuel::FuelNode;
pub use oil::OilNode;
