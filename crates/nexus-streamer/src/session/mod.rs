//! Streaming session state machine.
//!
//! One [`StreamSession`] actor exists per playback request. It owns the
//! connection to the streaming host, the receive buffer, the pending-message
//! queue, the channel routing table and every timer the protocol needs:
//!
//! ```text
//! Disconnected -> Connecting -> AwaitingAuth -> Authorized -> Streaming
//!       ^              ^                                         |
//!       |              +---------------- Redirect ---------------+
//!       +------------- close / error ----------------------------+
//! any state -> Stopped (explicit stop, terminal)
//! ```
//!
//! Callers talk to it through a [`StreamSessionHandle`]; protocol and
//! transport failures are logged and recorded but never returned.

pub mod actor;
pub(crate) mod messages;
mod writer;

use crate::identity::{ClientIdentity, TokenKind};
use crate::profiles::StreamQuality;
use nexus_protocol::frame::DEFAULT_MAX_BODY_LEN;
use nexus_protocol::messages::CodecType;
use rand::Rng;
use std::time::Duration;

pub use actor::{StreamSession, StreamSessionHandle};
pub use messages::{SessionState, SessionStatus};

/// Keepalive period while connected.
pub const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Delay before re-requesting playback after a transient "time not available".
pub const PLAYBACK_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Codec announced for return audio.
pub const TALKBACK_CODEC: CodecType = CodecType::Speex;

/// Sample rate announced for return audio.
pub const TALKBACK_SAMPLE_RATE: u32 = 16_000;

/// Upper bound (exclusive) of generated session ids.
pub const SESSION_ID_RANGE: u32 = 100;

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Initial streaming host; replaced on redirect.
    pub host: String,
    pub camera_uuid: String,
    pub device_id: String,
    pub token_kind: TokenKind,
    pub identity: ClientIdentity,
    pub quality: StreamQuality,
    /// Request audio when an audio sink is attached.
    pub audio_enabled: bool,
    pub max_frame_bytes: usize,
    /// Random, not unique across concurrent sessions.
    pub session_id: u32,
    pub ping_interval: Duration,
    pub playback_retry_delay: Duration,
    pub talkback_debounce: Duration,
}

impl SessionConfig {
    /// Settings with defaults and a random session id.
    #[must_use]
    pub fn new(host: impl Into<String>, camera_uuid: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            camera_uuid: camera_uuid.into(),
            device_id: "nexus-streamer".to_string(),
            token_kind: TokenKind::default(),
            identity: ClientIdentity::default(),
            quality: StreamQuality::default(),
            audio_enabled: true,
            max_frame_bytes: DEFAULT_MAX_BODY_LEN,
            session_id: rand::thread_rng().gen_range(0..SESSION_ID_RANGE),
            ping_interval: PING_INTERVAL,
            playback_retry_delay: PLAYBACK_RETRY_DELAY,
            talkback_debounce: crate::talkback::TALKBACK_DEBOUNCE,
        }
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: u32) -> Self {
        self.session_id = session_id;
        self
    }

    #[must_use]
    pub fn with_token_kind(mut self, token_kind: TokenKind) -> Self {
        self.token_kind = token_kind;
        self
    }

    #[must_use]
    pub fn with_quality(mut self, quality: StreamQuality) -> Self {
        self.quality = quality;
        self
    }

    #[must_use]
    pub fn with_audio_enabled(mut self, audio_enabled: bool) -> Self {
        self.audio_enabled = audio_enabled;
        self
    }

    #[must_use]
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }
}
