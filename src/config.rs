//! Configuration for the table bridge.
//!
//! Passed to [`Bridge::new()`](crate::Bridge::new). Can be constructed
//! programmatically or deserialized from JSON; every field has a default.
//!
//! # Configuration Structure
//!
//! ```text
//! BridgeConfig
//! ├── peer_id: String              # Label for logs and metrics
//! ├── upstream: Option<String>     # Initial store upstream address
//! ├── reconnect: ReconnectConfig
//! │   ├── shutdown_timeout         # Bound on store.shutdown()
//! │   └── initialize_timeout       # Bound on store.initialize_as_client()
//! └── inbound: InboundConfig
//!     └── drain_timeout            # How long shutdown waits for the receive loop
//! ```
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "peer_id": "serial0",
//!   "upstream": "10.0.0.2",
//!   "reconnect": { "initialize_timeout": "10s" }
//! }
//! ```

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Identifies the peer this bridge serves in logs and metric labels.
    #[serde(default = "default_peer_id")]
    pub peer_id: String,

    /// Upstream address to bind the store to at start-up.
    /// `None` leaves the store as the host configured it.
    #[serde(default)]
    pub upstream: Option<String>,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    #[serde(default)]
    pub inbound: InboundConfig,
}

fn default_peer_id() -> String {
    "peer".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            peer_id: default_peer_id(),
            upstream: None,
            reconnect: ReconnectConfig::default(),
            inbound: InboundConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Create a minimal config for testing.
    pub fn for_testing(peer_id: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            upstream: None,
            reconnect: ReconnectConfig {
                shutdown_timeout: "500ms".to_string(),
                initialize_timeout: "500ms".to_string(),
            },
            inbound: InboundConfig {
                drain_timeout: "500ms".to_string(),
            },
        }
    }

    /// Parse a config from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.peer_id.is_empty() {
            return Err(BridgeError::Config("peer_id must not be empty".to_string()));
        }
        if matches!(self.upstream.as_deref(), Some("")) {
            return Err(BridgeError::Config(
                "upstream must not be empty when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bounds on the store calls made during a reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Duration string (e.g., "5s"). Parsed to Duration internally.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: String,

    /// Duration string (e.g., "10s"). Parsed to Duration internally.
    #[serde(default = "default_initialize_timeout")]
    pub initialize_timeout: String,
}

fn default_shutdown_timeout() -> String {
    "5s".to_string()
}

fn default_initialize_timeout() -> String {
    "10s".to_string()
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: default_shutdown_timeout(),
            initialize_timeout: default_initialize_timeout(),
        }
    }
}

impl ReconnectConfig {
    pub fn shutdown_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.shutdown_timeout).unwrap_or(Duration::from_secs(5))
    }

    pub fn initialize_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.initialize_timeout).unwrap_or(Duration::from_secs(10))
    }
}

/// Inbound receive loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundConfig {
    /// How long shutdown waits for the receive loop to finish its current frame.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: String,
}

fn default_drain_timeout() -> String {
    "2s".to_string()
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            drain_timeout: default_drain_timeout(),
        }
    }
}

impl InboundConfig {
    pub fn drain_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.drain_timeout).unwrap_or(Duration::from_secs(2))
    }
}
