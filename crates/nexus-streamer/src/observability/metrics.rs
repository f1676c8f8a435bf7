//! Metrics definitions for the streamer.
//!
//! All metrics follow Prometheus naming conventions:
//! - `nexus_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `packet_type`: bounded by the packet type table (~17 values)
//! - `kind`: bounded by `StreamerError::label` (~9 values)
//! - `sink`: 2 values (video, audio)
//! - `reason`: 2 values (closed, full)
//! - `outcome`: 2 values (success, error)

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime, before any metrics are
/// recorded.
///
/// # Errors
///
/// Returns error if the recorder cannot be installed (e.g., already
/// installed) or the listener cannot be set up.
pub fn init_metrics_exporter(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))
}

// ============================================================================
// Session Metrics
// ============================================================================

/// Metric: `nexus_sessions_active`
pub fn session_started() {
    gauge!("nexus_sessions_active").increment(1.0);
}

/// Metric: `nexus_sessions_active`
pub fn session_ended() {
    gauge!("nexus_sessions_active").decrement(1.0);
}

/// Record a connection attempt outcome.
///
/// Metric: `nexus_connect_attempts_total`
/// Labels: `outcome` (success, error)
pub fn record_connect(outcome: &'static str) {
    counter!("nexus_connect_attempts_total", "outcome" => outcome).increment(1);
}

/// Metric: `nexus_redirects_total`
pub fn record_redirect() {
    counter!("nexus_redirects_total").increment(1);
}

/// Metric: `nexus_reauthorizations_total`
pub fn record_reauthorization() {
    counter!("nexus_reauthorizations_total").increment(1);
}

// ============================================================================
// Frame Metrics
// ============================================================================

/// Metric: `nexus_frames_received_total`
/// Labels: `packet_type`
pub fn record_frame_received(packet_type: &'static str) {
    counter!("nexus_frames_received_total", "packet_type" => packet_type).increment(1);
}

/// Metric: `nexus_frames_sent_total`
/// Labels: `packet_type`
pub fn record_frame_sent(packet_type: &'static str) {
    counter!("nexus_frames_sent_total", "packet_type" => packet_type).increment(1);
}

/// Record an outbound frame dropped because the host is not reading.
///
/// Metric: `nexus_frames_dropped_total`
/// Labels: `packet_type`
pub fn record_frame_dropped(packet_type: &'static str) {
    counter!("nexus_frames_dropped_total", "packet_type" => packet_type).increment(1);
}

/// Record a connection closed because the host broke the protocol.
///
/// Metric: `nexus_protocol_violations_total`
/// Labels: `kind`
pub fn record_protocol_violation(kind: &'static str) {
    counter!("nexus_protocol_violations_total", "kind" => kind).increment(1);
}

// ============================================================================
// Sink Metrics
// ============================================================================

/// Metric: `nexus_sink_bytes_written_total`
/// Labels: `sink`
pub fn record_sink_bytes(sink: &'static str, bytes: usize) {
    counter!("nexus_sink_bytes_written_total", "sink" => sink).increment(bytes as u64);
}

/// Metric: `nexus_sink_chunks_dropped_total`
/// Labels: `sink`, `reason`
pub fn record_sink_drop(sink: &'static str, reason: &'static str) {
    counter!("nexus_sink_chunks_dropped_total", "sink" => sink, "reason" => reason).increment(1);
}
