// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bridge lifecycle types.
//!
//! # State Transitions
//!
//! ```text
//!           start()
//! Created ──────────→ Starting ──(bound/opened)──→ Running
//!    │                   │                            │
//!    │                   │ (initial bind failed)      │ shutdown()
//!    │                   ↓                            ↓
//!    │                Failed ──────shutdown()───→ ShuttingDown ──→ Stopped
//!    │                                                ↑
//!    └───────────────────shutdown()───────────────────┘
//! ```
//!
//! This is the lifecycle of the bridge object itself. The store's upstream
//! binding has its own state machine, [`ConnectionState`](crate::reconnect::ConnectionState).

/// Lifecycle of a [`Bridge`](super::Bridge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Constructed, not started.
    Created,

    /// `start()` is binding the store and opening the forwarder.
    Starting,

    /// Forwarding local changes and accepting inbound frames.
    Running,

    /// `shutdown()` called. Draining the receive loop.
    ShuttingDown,

    /// Shut down cleanly. Safe to drop.
    Stopped,

    /// Initial bind failed. Only `shutdown()` is meaningful.
    Failed,
}

impl BridgeState {
    pub fn is_running(&self) -> bool {
        matches!(self, BridgeState::Running)
    }
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeState::Created => write!(f, "Created"),
            BridgeState::Starting => write!(f, "Starting"),
            BridgeState::Running => write!(f, "Running"),
            BridgeState::ShuttingDown => write!(f, "ShuttingDown"),
            BridgeState::Stopped => write!(f, "Stopped"),
            BridgeState::Failed => write!(f, "Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_state_display() {
        assert_eq!(BridgeState::Created.to_string(), "Created");
        assert_eq!(BridgeState::ShuttingDown.to_string(), "ShuttingDown");
        assert_eq!(BridgeState::Failed.to_string(), "Failed");
    }

    #[test]
    fn test_only_running_is_running() {
        assert!(BridgeState::Running.is_running());
        assert!(!BridgeState::Starting.is_running());
        assert!(!BridgeState::Stopped.is_running());
    }
}
