// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the table bridge.
//!
//! Errors are categorized by where they come from: the wire codec, the
//! store collaborator, or the transport. Codec errors never leave the
//! bridge (a bad frame is logged and dropped); store and transport errors
//! surface to whichever outer layer invoked the bridge.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Decode` | No | Malformed inbound frame |
//! | `Encode` | No | CBOR writer failed |
//! | `Store` | Yes | Store rejected a mutation or reconnect call |
//! | `Transport` | Yes | Outbound send failed |
//! | `Timeout` | Yes | Store call exceeded its configured bound |
//! | `Config` | No | Configuration invalid |
//! | `InvalidState` | No | Connection state machine violation |
//! | `Shutdown` | No | Bridge is shut down |
//!
//! # Retry Behavior
//!
//! The bridge itself never retries. [`BridgeError::is_retryable()`] tells the
//! outer layer whether trying again later can succeed.

use crate::codec::{DecodeError, EncodeError};
use crate::transport::TransportError;
use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while bridging a table.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Inbound frame could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Outbound message could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The store collaborator rejected an operation.
    ///
    /// Leaves the connection state where it was; the caller decides
    /// whether to issue another reconnect.
    #[error("Store error ({operation}): {message}")]
    Store { operation: String, message: String },

    /// Sending a frame to the peer failed.
    ///
    /// The transport owns its own reconnect and backpressure policy.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A store call did not return within its configured bound.
    #[error("Timed out after {timeout_ms}ms ({operation})")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection state machine violation.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// The bridge has been shut down.
    #[error("Shutdown in progress")]
    Shutdown,
}

impl BridgeError {
    /// Create a store error for the named operation.
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store { .. } => true,
            Self::Transport(_) => true,
            Self::Timeout { .. } => true,
            Self::Decode(_) => false, // Frame is bad at the source
            Self::Encode(_) => false,
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
            Self::Shutdown => false,
        }
    }
}
