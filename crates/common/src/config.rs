//! Common configuration types for the streamer components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Environment variable holding an `EnvFilter` directive string.
pub const LOG_FILTER_VAR: &str = "RUST_LOG";

/// Environment variable switching logs to JSON output.
pub const LOG_JSON_VAR: &str = "NEXUS_LOG_JSON";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directives (e.g. `nexus_streamer=debug,nexus_protocol=info`)
    pub log_filter: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl ObservabilityConfig {
    /// Read observability settings, using `default_filter` when `RUST_LOG`
    /// is unset.
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>, default_filter: &str) -> Self {
        let log_filter = vars
            .get(LOG_FILTER_VAR)
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| default_filter.to_string());

        let json_logs = vars
            .get(LOG_JSON_VAR)
            .and_then(|s| parse_bool(s))
            .unwrap_or(false);

        Self {
            log_filter,
            json_logs,
        }
    }
}

/// Parse the boolean spellings accepted in environment variables.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
