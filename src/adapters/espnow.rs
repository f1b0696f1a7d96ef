//! ESP-NOW transmit adapter implementing [`TransportPort`].
//!
//! The senders broadcast to a fixed peer (the dash display unit). ESP-NOW
//! gives no end-to-end delivery guarantee; the frame checksum plus the
//! receiver's sequence/staleness tracking cover loss and corruption, so a
//! failed send here is logged and dropped rather than retried.

use crate::error::Error;
use crate::packet::MAX_ESPNOW_PAYLOAD;
use crate::ports::TransportPort;
use log::{debug, warn};

/// MAC address of the display unit the senders pair with.
pub const DISPLAY_PEER_MAC: [u8; 6] = [0x24, 0x6F, 0x28, 0xAE, 0x52, 0x7C];

#[cfg(target_os = "espidf")]
pub struct EspNowTransport {
    peer: [u8; 6],
}

#[cfg(target_os = "espidf")]
impl EspNowTransport {
    /// Register the display unit as an ESP-NOW peer. Wi-Fi must already be
    /// started in station mode.
    pub fn new(peer: [u8; 6]) -> Result<Self, Error> {
        use esp_idf_svc::sys::*;

        // SAFETY: called once from the main task after Wi-Fi init.
        unsafe {
            if esp_now_init() != ESP_OK {
                return Err(Error::Init("esp_now_init failed"));
            }
            let mut info: esp_now_peer_info_t = core::mem::zeroed();
            info.peer_addr = peer;
            info.channel = 0; // current Wi-Fi channel
            info.encrypt = false;
            if esp_now_add_peer(&info) != ESP_OK {
                return Err(Error::Init("esp_now_add_peer failed"));
            }
        }
        Ok(Self { peer })
    }
}

#[cfg(target_os = "espidf")]
impl TransportPort for EspNowTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        use esp_idf_svc::sys::*;

        debug_assert!(frame.len() <= MAX_ESPNOW_PAYLOAD);
        // SAFETY: frame outlives the call; ESP-NOW copies the payload.
        let ret = unsafe { esp_now_send(self.peer.as_ptr(), frame.as_ptr(), frame.len()) };
        if ret != ESP_OK {
            warn!("ESP-NOW send failed (err {ret}), dropping frame");
            return Err(Error::Init("esp_now_send failed"));
        }
        debug!("ESP-NOW: sent {} bytes", frame.len());
        Ok(())
    }
}

/// Host-side transport that records every frame it is handed.
#[cfg(not(target_os = "espidf"))]
pub struct CaptureTransport {
    frames: Vec<Vec<u8>>,
    /// When set, every send fails; exercises the drop-and-continue path.
    pub fail_sends: bool,
}

#[cfg(not(target_os = "espidf"))]
impl CaptureTransport {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            fail_sends: false,
        }
    }

    pub fn sent(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for CaptureTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl TransportPort for CaptureTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        if self.fail_sends {
            warn!("simulated transport failure, dropping frame");
            return Err(Error::Init("simulated send failure"));
        }
        debug_assert!(frame.len() <= MAX_ESPNOW_PAYLOAD);
        debug!("capture transport: {} bytes", frame.len());
        self.frames.push(frame.to_vec());
        Ok(())
    }
}
