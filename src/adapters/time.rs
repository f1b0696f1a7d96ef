//! Monotonic clock adapter implementing [`TimePort`].

use crate::ports::TimePort;

#[cfg(not(target_os = "espidf"))]
use std::time::Instant;

/// Milliseconds since boot (device) or since construction (host).
pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimePort for MonotonicClock {
    fn now_ms(&self) -> u32 {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: esp_timer_get_time has no preconditions after boot.
            let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
            (us / 1000) as u32 // truncation is the documented ~49.7 day wrap
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.epoch.elapsed().as_millis() as u32
        }
    }
}
