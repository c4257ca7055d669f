//! Metrics for observability.
//!
//! Records through the `metrics` facade; the host installs an exporter.
//! Without one, every call here is a no-op.
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `nt_bridge_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration)

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record an outbound frame.
pub fn record_frame_sent(peer_id: &str, kind: &'static str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "nt_bridge_frames_sent_total",
        "peer_id" => peer_id.to_string(),
        "kind" => kind,
        "status" => status
    )
    .increment(1);
}

/// Record a decoded inbound frame.
pub fn record_frame_received(peer_id: &str, kind: &'static str) {
    counter!("nt_bridge_frames_received_total", "peer_id" => peer_id.to_string(), "kind" => kind)
        .increment(1);
}

/// Record an inbound frame that failed to decode.
pub fn record_decode_failure(peer_id: &str, reason: &'static str) {
    counter!("nt_bridge_decode_failures_total", "peer_id" => peer_id.to_string(), "reason" => reason)
        .increment(1);
}

/// Record an inbound value write rejected by the store.
pub fn record_store_write_failure(peer_id: &str) {
    counter!("nt_bridge_store_write_failures_total", "peer_id" => peer_id.to_string()).increment(1);
}

/// Record a completed or aborted reconnect sequence.
pub fn record_reconnect(peer_id: &str, outcome: &'static str, duration: Duration) {
    counter!("nt_bridge_reconnects_total", "peer_id" => peer_id.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("nt_bridge_reconnect_duration_seconds", "peer_id" => peer_id.to_string())
        .record(duration.as_secs_f64());
}

/// Record forwarder subscription changes.
pub fn record_subscription(peer_id: &str, action: &'static str) {
    counter!("nt_bridge_subscriptions_total", "peer_id" => peer_id.to_string(), "action" => action)
        .increment(1);
}

/// Gauge for connection state.
pub fn set_connection_state(peer_id: &str, state: &str) {
    // Encode state as numeric for alerting
    let value = match state {
        "Disconnected" => 0.0,
        "Connecting" => 1.0,
        "Connected" => 2.0,
        _ => -1.0,
    };
    gauge!("nt_bridge_connection_state", "peer_id" => peer_id.to_string()).set(value);
}
