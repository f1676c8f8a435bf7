//! Streamer configuration.
//!
//! Configuration is loaded from environment variables. The access token is
//! redacted in Debug output.

use crate::identity::{ClientIdentity, Environment, TokenKind};
use crate::profiles::StreamQuality;
use crate::session::SessionConfig;
use common::config::{parse_bool, ObservabilityConfig};
use common::secret::SecretString;
use nexus_protocol::frame::DEFAULT_MAX_BODY_LEN;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "nexus_streamer=debug,nexus_protocol=info";

/// Default device id prefix.
pub const DEFAULT_DEVICE_ID_PREFIX: &str = "nexus";

/// Streamer configuration.
#[derive(Clone)]
pub struct Config {
    /// Direct streaming host of the camera.
    pub host: String,

    /// Camera access token.
    /// Protected by `SecretString` to prevent accidental logging.
    pub access_token: SecretString,

    /// Camera uuid announced in `Hello`.
    pub camera_uuid: String,

    /// How the token is carried in `AuthorizeRequest` (default: google).
    pub token_kind: TokenKind,

    /// Deployment environment (default: production).
    pub environment: Environment,

    /// Requested quality tier (default: high).
    pub stream_quality: StreamQuality,

    /// Whether to request the audio profile (default: true).
    pub audio_enabled: bool,

    /// Device id announced in `Hello`.
    pub device_id: String,

    /// Largest frame body accepted from the host (default: 16 MiB).
    pub max_frame_bytes: usize,

    /// Where the H.264 elementary stream is written.
    pub video_output: Option<PathBuf>,

    /// Where the AAC elementary stream is written.
    pub audio_output: Option<PathBuf>,

    /// Source of return audio for the camera speaker.
    pub talkback_input: Option<PathBuf>,

    /// Prometheus exporter listen address; disabled when unset.
    pub metrics_bind_address: Option<String>,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("access_token", &"[REDACTED]")
            .field("camera_uuid", &self.camera_uuid)
            .field("token_kind", &self.token_kind)
            .field("environment", &self.environment)
            .field("stream_quality", &self.stream_quality)
            .field("audio_enabled", &self.audio_enabled)
            .field("device_id", &self.device_id)
            .field("max_frame_bytes", &self.max_frame_bytes)
            .field("video_output", &self.video_output)
            .field("audio_output", &self.audio_output)
            .field("talkback_input", &self.talkback_input)
            .field("metrics_bind_address", &self.metrics_bind_address)
            .field("observability", &self.observability)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    vars.get(key)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_enum<T>(vars: &HashMap<String, String>, key: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = String> + Default,
{
    match vars.get(key) {
        Some(value) => value
            .parse()
            .map_err(|e| ConfigError::InvalidValue(format!("{key}: {e}"))),
        None => Ok(T::default()),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or an enum-valued
    /// variable is not recognized.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let host = required(vars, "NEXUS_HOST")?;
        let access_token = SecretString::from(required(vars, "NEXUS_ACCESS_TOKEN")?);
        let camera_uuid = required(vars, "NEXUS_CAMERA_UUID")?;

        let token_kind = parse_enum(vars, "NEXUS_TOKEN_KIND")?;
        let environment = parse_enum(vars, "NEXUS_ENVIRONMENT")?;
        let stream_quality = parse_enum(vars, "NEXUS_STREAM_QUALITY")?;

        let audio_enabled = vars
            .get("NEXUS_AUDIO_ENABLED")
            .and_then(|s| parse_bool(s))
            .unwrap_or(true);

        let max_frame_bytes = vars
            .get("NEXUS_MAX_FRAME_BYTES")
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_MAX_BODY_LEN);

        let device_id = vars.get("NEXUS_DEVICE_ID").cloned().unwrap_or_else(|| {
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_DEVICE_ID_PREFIX}-{short_suffix}")
        });

        let path = |key: &str| {
            vars.get(key)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        };

        let metrics_bind_address = vars
            .get("NEXUS_METRICS_BIND_ADDRESS")
            .filter(|v| !v.trim().is_empty())
            .cloned();

        Ok(Config {
            host,
            access_token,
            camera_uuid,
            token_kind,
            environment,
            stream_quality,
            audio_enabled,
            device_id,
            max_frame_bytes,
            video_output: path("NEXUS_VIDEO_OUTPUT"),
            audio_output: path("NEXUS_AUDIO_OUTPUT"),
            talkback_input: path("NEXUS_TALKBACK_INPUT"),
            metrics_bind_address,
            observability: ObservabilityConfig::from_vars(vars, DEFAULT_LOG_FILTER),
        })
    }

    /// Session settings derived from this configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            host: self.host.clone(),
            camera_uuid: self.camera_uuid.clone(),
            device_id: self.device_id.clone(),
            token_kind: self.token_kind,
            identity: ClientIdentity::for_environment(self.environment),
            quality: self.stream_quality,
            audio_enabled: self.audio_enabled,
            max_frame_bytes: self.max_frame_bytes,
            ..SessionConfig::new(self.host.clone(), self.camera_uuid.clone())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "NEXUS_HOST".to_string(),
                "stream-us1-a.dropcam.com".to_string(),
            ),
            ("NEXUS_ACCESS_TOKEN".to_string(), "ya29.secret".to_string()),
            ("NEXUS_CAMERA_UUID".to_string(), "0123abcd".to_string()),
        ])
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_vars(&base_vars()).unwrap();

        assert_eq!(config.host, "stream-us1-a.dropcam.com");
        assert_eq!(config.access_token.expose_secret(), "ya29.secret");
        assert_eq!(config.token_kind, TokenKind::Google);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.stream_quality, StreamQuality::High);
        assert!(config.audio_enabled);
        assert_eq!(config.max_frame_bytes, DEFAULT_MAX_BODY_LEN);
        assert!(config.device_id.starts_with("nexus-"));
        assert_eq!(config.device_id.len(), "nexus-".len() + 8);
        assert!(config.video_output.is_none());
        assert!(config.metrics_bind_address.is_none());
        assert_eq!(config.observability.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_config_overrides() {
        let mut vars = base_vars();
        vars.insert("NEXUS_TOKEN_KIND".to_string(), "nest".to_string());
        vars.insert("NEXUS_ENVIRONMENT".to_string(), "field_test".to_string());
        vars.insert("NEXUS_STREAM_QUALITY".to_string(), "low".to_string());
        vars.insert("NEXUS_AUDIO_ENABLED".to_string(), "false".to_string());
        vars.insert("NEXUS_DEVICE_ID".to_string(), "device-1".to_string());
        vars.insert("NEXUS_MAX_FRAME_BYTES".to_string(), "4096".to_string());
        vars.insert("NEXUS_VIDEO_OUTPUT".to_string(), "/tmp/video.h264".to_string());
        vars.insert("NEXUS_METRICS_BIND_ADDRESS".to_string(), "127.0.0.1:9100".to_string());
        vars.insert("NEXUS_LOG_JSON".to_string(), "true".to_string());

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.token_kind, TokenKind::Nest);
        assert_eq!(config.environment, Environment::FieldTest);
        assert_eq!(config.stream_quality, StreamQuality::Low);
        assert!(!config.audio_enabled);
        assert_eq!(config.device_id, "device-1");
        assert_eq!(config.max_frame_bytes, 4096);
        assert_eq!(config.video_output, Some(PathBuf::from("/tmp/video.h264")));
        assert_eq!(config.metrics_bind_address.as_deref(), Some("127.0.0.1:9100"));
        assert!(config.observability.json_logs);
    }

    #[test]
    fn test_missing_required_var() {
        for key in ["NEXUS_HOST", "NEXUS_ACCESS_TOKEN", "NEXUS_CAMERA_UUID"] {
            let mut vars = base_vars();
            vars.remove(key);

            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::MissingEnvVar(ref k)) if k == key),
                "expected missing {key}"
            );
        }
    }

    #[test]
    fn test_invalid_enum_value_is_rejected() {
        let mut vars = base_vars();
        vars.insert("NEXUS_STREAM_QUALITY".to_string(), "ultra".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_unparseable_numbers_fall_back_to_defaults() {
        let mut vars = base_vars();
        vars.insert("NEXUS_MAX_FRAME_BYTES".to_string(), "lots".to_string());
        vars.insert("NEXUS_AUDIO_ENABLED".to_string(), "perhaps".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.max_frame_bytes, DEFAULT_MAX_BODY_LEN);
        assert!(config.audio_enabled);
    }

    #[test]
    fn test_debug_redacts_access_token() {
        let config = Config::from_vars(&base_vars()).unwrap();
        let debug_str = format!("{config:?}");

        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("ya29.secret"));
    }

    #[test]
    fn test_session_config_carries_settings() {
        let mut vars = base_vars();
        vars.insert("NEXUS_STREAM_QUALITY".to_string(), "medium".to_string());

        let config = Config::from_vars(&vars).unwrap();
        let session = config.session_config();

        assert_eq!(session.host, config.host);
        assert_eq!(session.camera_uuid, "0123abcd");
        assert_eq!(session.quality, StreamQuality::Medium);
        assert!(session.session_id < 100);
    }
}
