//! Message bodies exchanged with the streaming host.
//!
//! Bodies use protobuf wire encoding. Fields holding their zero value are
//! omitted on encode and decode back to that zero value; fields whose
//! protocol default is not zero are modelled as `Option` so that "absent"
//! stays distinguishable from an explicit zero.

use bytes::Bytes;

/// Protocol revision announced in `Hello`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtocolVersion {
    Version1 = 1,
    Version2 = 2,
    Version3 = 3,
}

/// Kind of client announced in `Hello`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ClientType {
    Android = 1,
    Ios = 2,
    Web = 3,
}

/// Codec of a playback channel or audio payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CodecType {
    Speex = 0,
    PcmS16Le = 1,
    H264 = 2,
    Aac = 3,
    Opus = 4,
    Meta = 5,
    DirectorsCut = 6,
}

/// Stream profiles a client may request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum StreamProfile {
    VideoH26450kbitL12 = 1,
    VideoH264530kbitL31 = 2,
    VideoH264100kbitL30 = 3,
    VideoH2642mbitL40 = 4,
    VideoH26450kbitL12Thumbnail = 5,
    Meta = 6,
    DirectorsCut = 7,
    AudioAac = 8,
    AudioSpeex = 9,
    AudioOpus = 10,
}

/// What the host should do when the primary profile is unavailable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProfileNotFoundAction {
    Redirect = 0,
    UseNextAvailable = 1,
}

/// Error codes carried by `Error` packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorCode {
    CameraNotConnected = 1,
    IllegalPacket = 2,
    AuthorizationFailed = 3,
    NoTranscoderAvailable = 4,
    TranscodeProxyError = 5,
    Internal = 6,
}

/// Reasons carried by `PlaybackEnd` packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PlaybackEndReason {
    UserEndedSession = 0,
    ErrorTimeNotAvailable = 1,
    ErrorProfileNotAvailable = 2,
    ErrorTranscodeNotAvailable = 3,
    ErrorLeafNodeCannotReachCamera = 4,
    PlayEndSessionComplete = 128,
}

/// Credentials, sent inside `Hello` and standalone for re-authorization.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthorizeRequest {
    #[prost(string, tag = "1")]
    pub session_token: String,
    #[prost(string, tag = "2")]
    pub wwn_access_token: String,
    #[prost(string, tag = "3")]
    pub service_access_key: String,
    #[prost(string, tag = "4")]
    pub olive_token: String,
}

/// First message on every connection.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Hello {
    #[prost(enumeration = "ProtocolVersion", optional, tag = "1")]
    pub protocol_version: Option<i32>,
    #[prost(string, tag = "2")]
    pub uuid: String,
    #[prost(bool, tag = "3")]
    pub require_connected_camera: bool,
    #[prost(string, tag = "6")]
    pub device_id: String,
    #[prost(string, tag = "7")]
    pub user_agent: String,
    #[prost(enumeration = "ClientType", tag = "9")]
    pub client_type: i32,
    /// Encoded `AuthorizeRequest`
    #[prost(bytes = "bytes", tag = "12")]
    pub authorize_request: Bytes,
}

/// Request to begin playback.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartPlayback {
    #[prost(uint32, tag = "1")]
    pub session_id: u32,
    #[prost(enumeration = "StreamProfile", optional, tag = "2")]
    pub profile: Option<i32>,
    #[prost(uint64, tag = "3")]
    pub start_time: u64,
    #[prost(enumeration = "StreamProfile", repeated, packed = "false", tag = "6")]
    pub other_profiles: Vec<i32>,
    #[prost(enumeration = "ProfileNotFoundAction", optional, tag = "7")]
    pub profile_not_found_action: Option<i32>,
}

impl StartPlayback {
    /// Profile used by the host when none is given.
    pub const DEFAULT_PROFILE: StreamProfile = StreamProfile::VideoH264530kbitL31;

    /// The requested profile, falling back to the protocol default when the
    /// field is absent or carries an unknown value.
    #[must_use]
    pub fn requested_profile(&self) -> StreamProfile {
        self.profile
            .and_then(|p| StreamProfile::try_from(p).ok())
            .unwrap_or(Self::DEFAULT_PROFILE)
    }
}

/// Request to end playback.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopPlayback {
    #[prost(uint32, tag = "1")]
    pub session_id: u32,
}

/// One logical sub-stream declared by `PlaybackBegin`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Channel {
    #[prost(uint32, tag = "1")]
    pub channel_id: u32,
    #[prost(enumeration = "CodecType", tag = "2")]
    pub codec_type: i32,
    #[prost(uint32, tag = "3")]
    pub sample_rate: u32,
    #[prost(bytes = "bytes", repeated, tag = "4")]
    pub private_data: Vec<Bytes>,
    #[prost(double, tag = "5")]
    pub start_time: f64,
    #[prost(uint32, tag = "6")]
    pub udp_ssrc: u32,
    #[prost(uint32, tag = "7")]
    pub rtp_start_time: u32,
    #[prost(enumeration = "StreamProfile", optional, tag = "8")]
    pub profile: Option<i32>,
}

/// Playback established.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlaybackBegin {
    #[prost(uint32, tag = "1")]
    pub session_id: u32,
    #[prost(message, repeated, tag = "2")]
    pub channels: Vec<Channel>,
    #[prost(bytes = "bytes", tag = "3")]
    pub srtp_master_key: Bytes,
    #[prost(bytes = "bytes", tag = "4")]
    pub srtp_master_salt: Bytes,
    #[prost(uint32, tag = "5")]
    pub fec_k_val: u32,
    #[prost(uint32, tag = "6")]
    pub fec_n_val: u32,
}

/// Media payload on one channel.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlaybackPacket {
    #[prost(uint32, tag = "1")]
    pub session_id: u32,
    #[prost(uint32, tag = "2")]
    pub channel_id: u32,
    #[prost(sint32, tag = "3")]
    pub timestamp_delta: i32,
    #[prost(bytes = "bytes", tag = "4")]
    pub payload: Bytes,
    #[prost(uint64, tag = "5")]
    pub latency_rtp_sequence: u64,
    #[prost(uint64, tag = "6")]
    pub latency_rtp_ssrc: u64,
}

/// Playback finished.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlaybackEnd {
    #[prost(uint32, tag = "1")]
    pub session_id: u32,
    #[prost(enumeration = "PlaybackEndReason", tag = "2")]
    pub reason: i32,
}

/// Return audio for the camera speaker. An empty payload ends the utterance.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AudioPayload {
    #[prost(bytes = "bytes", tag = "1")]
    pub payload: Bytes,
    #[prost(uint32, tag = "2")]
    pub session_id: u32,
    #[prost(enumeration = "CodecType", tag = "3")]
    pub codec: i32,
    #[prost(uint32, tag = "4")]
    pub sample_rate: u32,
    #[prost(uint32, tag = "5")]
    pub latency_measure_tag: u32,
}

/// Instruction to reconnect elsewhere.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Redirect {
    #[prost(string, tag = "1")]
    pub new_host: String,
    #[prost(bool, tag = "2")]
    pub is_transcode: bool,
}

/// Error reported by the host.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorPacket {
    #[prost(enumeration = "ErrorCode", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

impl ErrorPacket {
    /// Whether this error asks the client to re-send its credentials.
    #[must_use]
    pub fn is_authorization_failure(&self) -> bool {
        self.code == ErrorCode::AuthorizationFailed as i32
    }
}
