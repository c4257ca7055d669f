// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Wire message codec.
//!
//! Every frame exchanged with a peer is a single CBOR map with short text keys:
//!
//! ```text
//! ValueUpdate       {"k": key, "v": value, "n": is_new}
//! ConnectionStatus  {"r": connected, "a": remote_address | null}
//! ReconnectRequest  {"a": address}
//! ```
//!
//! # Variant Discrimination
//!
//! Decoding looks at which fields are present, in this order:
//!
//! 1. `"r"` present → `ConnectionStatus`
//! 2. `"a"` present and `"k"` absent → `ReconnectRequest`
//! 3. `"k"` present → `ValueUpdate` (`"n"` may be omitted, meaning `false`)
//!
//! Anything else is a [`DecodeError`]. Decoding never panics on arbitrary
//! input; see the fuzz target under `fuzz/`.
//!
//! # Example
//!
//! ```rust
//! use nt_bridge::codec::{decode, encode, WireMessage};
//!
//! let msg = WireMessage::ReconnectRequest { address: "10.0.0.2".into() };
//! let frame = encode(&msg).unwrap();
//! assert_eq!(decode(&frame).unwrap(), msg);
//! ```

use crate::value::Value;
use ciborium::value::Value as Cbor;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

const FIELD_KEY: &str = "k";
const FIELD_VALUE: &str = "v";
const FIELD_IS_NEW: &str = "n";
const FIELD_CONNECTED: &str = "r";
const FIELD_ADDRESS: &str = "a";

/// A message exchanged with a peer.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// A table entry changed (or was replayed on subscription).
    ValueUpdate { key: String, value: Value, is_new: bool },
    /// The local store gained or lost its upstream link.
    ConnectionStatus {
        connected: bool,
        remote_address: Option<String>,
    },
    /// The peer asks the bridge to rebind the store to a new upstream.
    ReconnectRequest { address: String },
}

impl WireMessage {
    /// Variant name, used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::ValueUpdate { .. } => "value_update",
            WireMessage::ConnectionStatus { .. } => "connection_status",
            WireMessage::ReconnectRequest { .. } => "reconnect_request",
        }
    }
}

/// Why an inbound frame could not be decoded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("malformed CBOR: {0}")]
    Malformed(String),

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    #[error("message is not a map")]
    NotAMap,

    #[error("map key is not text")]
    NonTextKey,

    #[error("no discriminating field (k, r or a) present")]
    MissingDiscriminator,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' has wrong type, expected {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unsupported value: {0}")]
    UnsupportedValue(String),
}

impl DecodeError {
    /// Stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) => "malformed",
            DecodeError::TrailingBytes(_) => "trailing_bytes",
            DecodeError::NotAMap => "not_a_map",
            DecodeError::NonTextKey => "non_text_key",
            DecodeError::MissingDiscriminator => "missing_discriminator",
            DecodeError::MissingField(_) => "missing_field",
            DecodeError::FieldType { .. } => "field_type",
            DecodeError::UnsupportedValue(_) => "unsupported_value",
        }
    }
}

/// The CBOR writer failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("CBOR encode failed: {0}")]
pub struct EncodeError(pub String);

/// Encode a message into a single CBOR frame.
pub fn encode(message: &WireMessage) -> Result<Vec<u8>, EncodeError> {
    let map = match message {
        WireMessage::ValueUpdate { key, value, is_new } => vec![
            (text(FIELD_KEY), Cbor::Text(key.clone())),
            (text(FIELD_VALUE), value_to_cbor(value)),
            (text(FIELD_IS_NEW), Cbor::Bool(*is_new)),
        ],
        WireMessage::ConnectionStatus {
            connected,
            remote_address,
        } => vec![
            (text(FIELD_CONNECTED), Cbor::Bool(*connected)),
            (
                text(FIELD_ADDRESS),
                remote_address.clone().map(Cbor::Text).unwrap_or(Cbor::Null),
            ),
        ],
        WireMessage::ReconnectRequest { address } => {
            vec![(text(FIELD_ADDRESS), Cbor::Text(address.clone()))]
        }
    };

    let mut frame = Vec::new();
    ciborium::ser::into_writer(&Cbor::Map(map), &mut frame)
        .map_err(|e| EncodeError(e.to_string()))?;
    Ok(frame)
}

/// Decode a single CBOR frame into a message.
pub fn decode(frame: &[u8]) -> Result<WireMessage, DecodeError> {
    let mut reader = frame;
    let item: Cbor = ciborium::de::from_reader(&mut reader)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    if !reader.is_empty() {
        return Err(DecodeError::TrailingBytes(reader.len()));
    }

    let entries = match item {
        Cbor::Map(entries) => entries,
        _ => return Err(DecodeError::NotAMap),
    };

    // Later duplicates overwrite earlier ones
    let mut fields: HashMap<String, Cbor> = HashMap::with_capacity(entries.len());
    for (k, v) in entries {
        match k {
            Cbor::Text(k) => {
                fields.insert(k, v);
            }
            _ => return Err(DecodeError::NonTextKey),
        }
    }

    if let Some(connected) = fields.remove(FIELD_CONNECTED) {
        let connected = match connected {
            Cbor::Bool(b) => b,
            _ => {
                return Err(DecodeError::FieldType {
                    field: FIELD_CONNECTED,
                    expected: "bool",
                })
            }
        };
        let remote_address = match fields.remove(FIELD_ADDRESS) {
            None | Some(Cbor::Null) => None,
            Some(Cbor::Text(addr)) => Some(addr),
            Some(_) => {
                return Err(DecodeError::FieldType {
                    field: FIELD_ADDRESS,
                    expected: "text or null",
                })
            }
        };
        return Ok(WireMessage::ConnectionStatus {
            connected,
            remote_address,
        });
    }

    if !fields.contains_key(FIELD_KEY) {
        return match fields.remove(FIELD_ADDRESS) {
            Some(Cbor::Text(address)) => Ok(WireMessage::ReconnectRequest { address }),
            Some(_) => Err(DecodeError::FieldType {
                field: FIELD_ADDRESS,
                expected: "text",
            }),
            None => Err(DecodeError::MissingDiscriminator),
        };
    }

    let key = match fields.remove(FIELD_KEY) {
        Some(Cbor::Text(key)) => key,
        _ => {
            return Err(DecodeError::FieldType {
                field: FIELD_KEY,
                expected: "text",
            })
        }
    };
    let value = fields
        .remove(FIELD_VALUE)
        .ok_or(DecodeError::MissingField(FIELD_VALUE))
        .and_then(cbor_to_value)?;
    let is_new = match fields.remove(FIELD_IS_NEW) {
        None => false,
        Some(Cbor::Bool(b)) => b,
        // Older peers send the flag as an integer
        Some(Cbor::Integer(i)) => i128::from(i) != 0,
        Some(_) => {
            return Err(DecodeError::FieldType {
                field: FIELD_IS_NEW,
                expected: "bool",
            })
        }
    };

    Ok(WireMessage::ValueUpdate { key, value, is_new })
}

fn text(s: &str) -> Cbor {
    Cbor::Text(s.to_string())
}

fn value_to_cbor(value: &Value) -> Cbor {
    match value {
        Value::Bool(b) => Cbor::Bool(*b),
        Value::Integer(i) => Cbor::Integer((*i).into()),
        Value::Double(d) => Cbor::Float(*d),
        Value::String(s) => Cbor::Text(s.clone()),
        Value::Raw(bytes) => Cbor::Bytes(bytes.clone()),
        Value::Array(items) => Cbor::Array(items.iter().map(value_to_cbor).collect()),
        Value::Map(map) => Cbor::Map(
            map.iter()
                .map(|(k, v)| (Cbor::Text(k.clone()), value_to_cbor(v)))
                .collect(),
        ),
    }
}

fn cbor_to_value(item: Cbor) -> Result<Value, DecodeError> {
    match item {
        Cbor::Bool(b) => Ok(Value::Bool(b)),
        Cbor::Integer(i) => i64::try_from(i)
            .map(Value::Integer)
            .map_err(|_| DecodeError::UnsupportedValue("integer out of i64 range".to_string())),
        Cbor::Float(d) => Ok(Value::Double(d)),
        Cbor::Text(s) => Ok(Value::String(s)),
        Cbor::Bytes(bytes) => Ok(Value::Raw(bytes)),
        Cbor::Array(items) => items
            .into_iter()
            .map(cbor_to_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Cbor::Map(entries) => {
            let mut map = BTreeMap::new();
            for (k, v) in entries {
                let k = match k {
                    Cbor::Text(k) => k,
                    _ => return Err(DecodeError::NonTextKey),
                };
                map.insert(k, cbor_to_value(v)?);
            }
            Ok(Value::Map(map))
        }
        Cbor::Null => Err(DecodeError::UnsupportedValue("null".to_string())),
        Cbor::Tag(tag, _) => Err(DecodeError::UnsupportedValue(format!("tag {}", tag))),
        _ => Err(DecodeError::UnsupportedValue("simple value".to_string())),
    }
}
