//! Port traits — the boundary between the domain core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ node service / calibration (domain)
//! ```
//!
//! Driven adapters (NVS, ESP-NOW, the monotonic clock) implement these
//! traits. The node services consume them via generics, so the pipeline
//! code never touches hardware directly and every test runs on the host.

use crate::error::StorageError;

// ───────────────────────────────────────────────────────────────
// Storage port (domain ↔ NVS flash)
// ───────────────────────────────────────────────────────────────

/// Key/value blob storage scoped by a short namespace.
///
/// Absent keys are reported as [`StorageError::NotFound`]; the calibration
/// store turns that into the documented default, never an error. Writes
/// must be committed before `write` returns — an `Ok` means the value
/// survives power loss.
pub trait StoragePort {
    /// Read a blob into `buf`, returning the number of bytes copied.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write and commit a blob.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Time port (monotonic clock)
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since node boot.
///
/// Not wall-clock time: the value is only used for cadence gating and for
/// the `timestamp` field of outgoing frames (staleness/ordering on the
/// receiver side). Wraps every ~49.7 days; all consumers use wrapping
/// arithmetic.
pub trait TimePort {
    fn now_ms(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Transport port (domain → wireless link)
// ───────────────────────────────────────────────────────────────

/// One-way telemetry transmit. The link layer (ESP-NOW) owns pairing,
/// retries and delivery callbacks; the domain just hands over an encoded
/// frame. A send failure is logged and the frame dropped — the next
/// transmit cadence produces a fresh one.
pub trait TransportPort {
    fn send(&mut self, frame: &[u8]) -> Result<(), crate::error::Error>;
}
