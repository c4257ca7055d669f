//! Transport that keeps every frame it is asked to send.

use nt_bridge::{decode, Transport, TransportError, Value, WireMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingTransport {
    frames: Mutex<Vec<Vec<u8>>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }

    /// Every sent frame, decoded.
    pub fn messages(&self) -> Vec<WireMessage> {
        self.frames()
            .iter()
            .map(|f| decode(f).expect("bridge sent an undecodable frame"))
            .collect()
    }

    /// `(key, value, is_new)` of every sent ValueUpdate, in order.
    pub fn value_updates(&self) -> Vec<(String, Value, bool)> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                WireMessage::ValueUpdate { key, value, is_new } => Some((key, value, is_new)),
                _ => None,
            })
            .collect()
    }

    pub fn connection_statuses(&self) -> Vec<(bool, Option<String>)> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                WireMessage::ConnectionStatus {
                    connected,
                    remote_address,
                } => Some((connected, remote_address)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }
}

impl Transport for RecordingTransport {
    fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Send("link down".to_string()));
        }
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}
