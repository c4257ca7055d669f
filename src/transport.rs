// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Transport send primitive.
//!
//! The bridge does not own a socket. The host (a websocket server, a serial
//! port task) hands it something that can send one frame, and feeds inbound
//! frames to [`Bridge::spawn_inbound`](crate::bridge::Bridge::spawn_inbound).

use thiserror::Error;
use tokio::sync::mpsc;

/// Sending a frame failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer side of the transport has gone away.
    #[error("transport closed")]
    Closed,

    /// Transport-specific failure.
    #[error("send failed: {0}")]
    Send(String),
}

/// Something that can deliver a frame to the peer.
///
/// `send` is called from store notification threads as well as from the
/// reconnect sequence, so it must not block for long.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, frame: Vec<u8>) -> Result<(), TransportError>;
}

/// Transport backed by an unbounded channel.
///
/// The receiving half is drained by whatever task owns the real socket.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { tx }
    }

    /// Create a transport together with the receiver for its frames.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}
