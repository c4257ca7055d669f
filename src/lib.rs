//! # NT Bridge
//!
//! Mirrors a shared network table onto a byte-stream transport (websocket,
//! serial link) and rebinds the table's upstream when the peer asks for it.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                                nt-bridge                                  │
//! │                                                                           │
//! │  ┌────────────┐  change/conn   ┌─────────────────┐  CBOR   ┌───────────┐  │
//! │  │ TableStore │───listeners───►│ ChangeForwarder │────────►│ Transport │──┼──► peer
//! │  └────────────┘                └─────────────────┘         └───────────┘  │
//! │     ▲      ▲                            ▲ close / open                    │
//! │     │      │ shutdown / initialize      │                                 │
//! │     │   ┌──┴─────────────────────────────┴─┐                              │
//! │     │   │ Reconnector (serialized)         │                              │
//! │     │   └──────────────────────────────────┘                              │
//! │     │ set_entry          ▲ ReconnectRequest                               │
//! │  ┌──┴────────────────────┴──┐   decode   ┌──────────────┐                 │
//! │  │ MessageApplier           │◄───────────│ receive loop │◄────────────────┼─── peer
//! │  └──────────────────────────┘            └──────────────┘                 │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//!
//! Each frame is one CBOR map:
//!
//! | Message | Map |
//! |---------|-----|
//! | `ValueUpdate` | `{"k": key, "v": value, "n": is_new}` |
//! | `ConnectionStatus` | `{"r": connected, "a": address \| null}` |
//! | `ReconnectRequest` | `{"a": address}` |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nt_bridge::{Bridge, BridgeConfig, ChannelTransport, MemoryStore};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> nt_bridge::Result<()> {
//!     let config = BridgeConfig::from_json(r#"{"peer_id": "ws0", "upstream": "10.0.0.2"}"#)?;
//!     let (transport, _outbound) = ChannelTransport::pair();
//!     let (_inbound_tx, inbound_rx) = mpsc::channel(64);
//!
//!     let bridge = Bridge::new(config, Arc::new(MemoryStore::new()), Arc::new(transport))?;
//!     bridge.start().await?;
//!     bridge.spawn_inbound(inbound_rx)?;
//!
//!     // Bridge runs until shutdown
//!     bridge.shutdown().await
//! }
//! ```

pub mod applier;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod metrics;
pub mod mirror;
pub mod reconnect;
pub mod store;
pub mod transport;
pub mod value;

// Re-exports for convenience
pub use applier::{ApplyOutcome, MessageApplier};
pub use bridge::{Bridge, BridgeState};
pub use codec::{decode, encode, DecodeError, EncodeError, WireMessage};
pub use config::{BridgeConfig, InboundConfig, ReconnectConfig};
pub use error::{BridgeError, Result};
pub use forwarder::{ChangeForwarder, SubscriptionHandle};
pub use mirror::{MirrorEvent, PeerMirror};
pub use reconnect::{ConnectionState, Reconnector};
pub use store::{ListenerHandle, MemoryStore, StoreError, TableStore};
pub use transport::{ChannelTransport, Transport, TransportError};
pub use value::Value;
