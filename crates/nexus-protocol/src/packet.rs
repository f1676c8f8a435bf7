//! Packet type tags.

/// Type tag carried in the first byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Keepalive, empty body
    Ping = 1,
    /// Client greeting carrying the authorization payload
    Hello = 100,
    /// Return (talkback) audio
    AudioPayload = 102,
    /// Request playback of a set of profiles
    StartPlayback = 103,
    /// Stop the current playback session
    StopPlayback = 104,
    /// Host accepted the client's authorization
    Ok = 200,
    /// Host reported an error
    Error = 201,
    /// Playback session established, channels declared
    PlaybackBegin = 202,
    /// Playback session finished
    PlaybackEnd = 203,
    /// Media payload with a 2-byte length
    PlaybackPacket = 204,
    /// Media payload with a 4-byte length
    LongPlaybackPacket = 205,
    /// Host clock synchronisation
    ClockSync = 206,
    /// Reconnect to another host
    Redirect = 207,
    /// Talkback session opened on the camera
    TalkbackBegin = 208,
    /// Talkback session closed on the camera
    TalkbackEnd = 209,
    /// Standalone authorization payload
    AuthorizeRequest = 212,
}

impl PacketType {
    /// Map a wire tag to a known packet type.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Ping,
            100 => Self::Hello,
            102 => Self::AudioPayload,
            103 => Self::StartPlayback,
            104 => Self::StopPlayback,
            200 => Self::Ok,
            201 => Self::Error,
            202 => Self::PlaybackBegin,
            203 => Self::PlaybackEnd,
            204 => Self::PlaybackPacket,
            205 => Self::LongPlaybackPacket,
            206 => Self::ClockSync,
            207 => Self::Redirect,
            208 => Self::TalkbackBegin,
            209 => Self::TalkbackEnd,
            212 => Self::AuthorizeRequest,
            _ => return None,
        })
    }

    /// Whether frames of this type carry a 4-byte length.
    #[must_use]
    pub const fn has_long_length(self) -> bool {
        matches!(self, Self::LongPlaybackPacket)
    }

    /// Bounded label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Hello => "hello",
            Self::AudioPayload => "audio_payload",
            Self::StartPlayback => "start_playback",
            Self::StopPlayback => "stop_playback",
            Self::Ok => "ok",
            Self::Error => "error",
            Self::PlaybackBegin => "playback_begin",
            Self::PlaybackEnd => "playback_end",
            Self::PlaybackPacket => "playback_packet",
            Self::LongPlaybackPacket => "long_playback_packet",
            Self::ClockSync => "clock_sync",
            Self::Redirect => "redirect",
            Self::TalkbackBegin => "talkback_begin",
            Self::TalkbackEnd => "talkback_end",
            Self::AuthorizeRequest => "authorize_request",
        }
    }
}

impl From<PacketType> for u8 {
    fn from(value: PacketType) -> Self {
        value as u8
    }
}
