//! Streamer error types.
//!
//! None of these cross the public session operations except
//! [`StreamerError::ChannelClosed`]; protocol and transport failures are
//! logged and recorded inside the session actor.

use crate::config::ConfigError;
use nexus_protocol::{CodecError, FrameError};
use thiserror::Error;

/// Streamer error type.
#[derive(Debug, Error)]
pub enum StreamerError {
    /// TCP or TLS connection to the streaming host failed.
    #[error("Connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Host name is not a valid TLS server name.
    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    /// TLS client configuration could not be built.
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Socket read or write failed after connecting.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Frame layer rejected the byte stream.
    #[error("Protocol violation: {0}")]
    Frame(#[from] FrameError),

    /// Frame body could not be decoded.
    #[error("Protocol violation: {0}")]
    Codec(#[from] CodecError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session actor is gone.
    #[error("Session actor is no longer running")]
    ChannelClosed,
}

impl StreamerError {
    /// Whether the peer sent bytes that break the protocol.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Frame(_) | Self::Codec(_))
    }

    /// Bounded label for metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::InvalidServerName(_) => "invalid_server_name",
            Self::Tls(_) => "tls",
            Self::Transport(_) => "transport",
            Self::Frame(FrameError::Oversized { .. }) => "oversized_frame",
            Self::Frame(_) => "frame",
            Self::Codec(_) => "malformed_body",
            Self::Config(_) => "config",
            Self::ChannelClosed => "channel_closed",
        }
    }
}
