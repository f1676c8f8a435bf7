//! Messages and snapshots exchanged with the session actor.

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::oneshot;

/// Messages handled by `StreamSession`.
#[derive(Debug)]
pub(crate) enum SessionMessage {
    /// Request playback, connecting first if needed.
    StartPlayback,

    /// Stop playback and end the session.
    StopPlayback { respond_to: oneshot::Sender<()> },

    /// Take a status snapshot.
    GetStatus {
        respond_to: oneshot::Sender<SessionStatus>,
    },

    /// A chunk of return audio. An empty payload marks end of speech.
    Talkback { payload: Bytes },
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No connection; waiting for a start request.
    Disconnected,
    /// TCP/TLS connection in progress.
    Connecting,
    /// Hello sent, waiting for `Ok`.
    AwaitingAuth,
    /// Host accepted the credentials.
    Authorized,
    /// `PlaybackBegin` received; media is flowing.
    Streaming,
    /// Explicitly stopped. Terminal.
    Stopped,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingAuth => "awaiting_auth",
            SessionState::Authorized => "authorized",
            SessionState::Streaming => "streaming",
            SessionState::Stopped => "stopped",
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub session_id: u32,
    pub state: SessionState,
    pub host: String,
    pub authorized: bool,
    pub started: bool,
    pub video_channel: Option<u32>,
    pub audio_channel: Option<u32>,
    pub pending_messages: usize,
    pub redirects: u64,
    pub reauthorizations: u64,
}
