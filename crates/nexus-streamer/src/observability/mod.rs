//! Observability for the streamer.
//!
//! # Privacy by Default
//!
//! The session run loop uses `#[instrument(skip_all)]` with an explicit
//! allow-list of fields (session id, host). Access tokens never reach a log
//! line or a metric label.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `nexus_sessions_active` | Gauge | none | Running session actors |
//! | `nexus_connect_attempts_total` | Counter | `outcome` | Connections opened or failed |
//! | `nexus_frames_received_total` | Counter | `packet_type` | Inbound frames by type |
//! | `nexus_frames_sent_total` | Counter | `packet_type` | Outbound frames by type |
//! | `nexus_frames_dropped_total` | Counter | `packet_type` | Outbound frames dropped on a stalled connection |
//! | `nexus_redirects_total` | Counter | none | Host redirects followed |
//! | `nexus_reauthorizations_total` | Counter | none | In-place re-authorizations |
//! | `nexus_protocol_violations_total` | Counter | `kind` | Connections closed for bad input |
//! | `nexus_sink_bytes_written_total` | Counter | `sink` | Media bytes handed to sinks |
//! | `nexus_sink_chunks_dropped_total` | Counter | `sink`, `reason` | Media chunks dropped |

pub mod metrics;
