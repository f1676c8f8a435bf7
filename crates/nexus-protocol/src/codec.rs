//! Codec for turning frames into typed packets and back.

use crate::frame::Frame;
use crate::messages::{
    AudioPayload, AuthorizeRequest, ErrorPacket, Hello, PlaybackBegin, PlaybackEnd,
    PlaybackPacket, Redirect, StartPlayback, StopPlayback,
};
use crate::packet::PacketType;
use bytes::Bytes;
use prost::Message;

/// Upper bound on channels declared by a single `PlaybackBegin`.
pub const MAX_CHANNELS: usize = 32;

/// Error type for codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Body is not a valid encoding of the message for its packet type
    #[error("Malformed {} body: {source}", packet_type.as_str())]
    Malformed {
        packet_type: PacketType,
        #[source]
        source: prost::DecodeError,
    },

    /// `PlaybackBegin` declares more channels than any host sends
    #[error("Too many channels: {0}")]
    TooManyChannels(usize),
}

/// A decoded packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Ping,
    Hello(Hello),
    AuthorizeRequest(AuthorizeRequest),
    AudioPayload(AudioPayload),
    StartPlayback(StartPlayback),
    StopPlayback(StopPlayback),
    Ok,
    Error(ErrorPacket),
    PlaybackBegin(PlaybackBegin),
    PlaybackEnd(PlaybackEnd),
    /// Short and long playback packets decode to the same variant.
    PlaybackPacket(PlaybackPacket),
    Redirect(Redirect),
    /// Known packet type whose body is not interpreted (clock sync, talkback markers)
    Control { packet_type: PacketType, body: Bytes },
    /// Tag this crate does not know
    Unknown { packet_type: u8, body: Bytes },
}

fn decode_body<M: Message + Default>(packet_type: PacketType, body: Bytes) -> Result<M, CodecError> {
    M::decode(body).map_err(|source| CodecError::Malformed {
        packet_type,
        source,
    })
}

impl Packet {
    /// Decode a frame body according to its type tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is malformed for its packet type.
    pub fn decode(frame: Frame) -> Result<Self, CodecError> {
        let Some(packet_type) = frame.kind() else {
            return Ok(Self::Unknown {
                packet_type: frame.packet_type,
                body: frame.body,
            });
        };
        let body = frame.body;

        let packet = match packet_type {
            PacketType::Ping => Self::Ping,
            PacketType::Ok => Self::Ok,
            PacketType::Hello => Self::Hello(decode_body(packet_type, body)?),
            PacketType::AuthorizeRequest => {
                Self::AuthorizeRequest(decode_body(packet_type, body)?)
            }
            PacketType::AudioPayload => Self::AudioPayload(decode_body(packet_type, body)?),
            PacketType::StartPlayback => Self::StartPlayback(decode_body(packet_type, body)?),
            PacketType::StopPlayback => Self::StopPlayback(decode_body(packet_type, body)?),
            PacketType::Error => Self::Error(decode_body(packet_type, body)?),
            PacketType::PlaybackBegin => {
                let begin: PlaybackBegin = decode_body(packet_type, body)?;
                if begin.channels.len() > MAX_CHANNELS {
                    return Err(CodecError::TooManyChannels(begin.channels.len()));
                }
                Self::PlaybackBegin(begin)
            }
            PacketType::PlaybackEnd => Self::PlaybackEnd(decode_body(packet_type, body)?),
            PacketType::PlaybackPacket | PacketType::LongPlaybackPacket => {
                Self::PlaybackPacket(decode_body(packet_type, body)?)
            }
            PacketType::Redirect => Self::Redirect(decode_body(packet_type, body)?),
            PacketType::ClockSync | PacketType::TalkbackBegin | PacketType::TalkbackEnd => {
                Self::Control { packet_type, body }
            }
        };
        Ok(packet)
    }

    /// Raw type tag this packet is sent with.
    ///
    /// Playback packets whose body does not fit a 2-byte length use the long
    /// packet tag.
    #[must_use]
    pub fn packet_type(&self) -> u8 {
        let kind = match self {
            Self::Ping => PacketType::Ping,
            Self::Hello(_) => PacketType::Hello,
            Self::AuthorizeRequest(_) => PacketType::AuthorizeRequest,
            Self::AudioPayload(_) => PacketType::AudioPayload,
            Self::StartPlayback(_) => PacketType::StartPlayback,
            Self::StopPlayback(_) => PacketType::StopPlayback,
            Self::Ok => PacketType::Ok,
            Self::Error(_) => PacketType::Error,
            Self::PlaybackBegin(_) => PacketType::PlaybackBegin,
            Self::PlaybackEnd(_) => PacketType::PlaybackEnd,
            Self::PlaybackPacket(p) => {
                if p.encoded_len() > usize::from(u16::MAX) {
                    PacketType::LongPlaybackPacket
                } else {
                    PacketType::PlaybackPacket
                }
            }
            Self::Redirect(_) => PacketType::Redirect,
            Self::Control { packet_type, .. } => *packet_type,
            Self::Unknown { packet_type, .. } => return *packet_type,
        };
        kind.into()
    }

    /// Encode the body of this packet.
    #[must_use]
    pub fn encode_body(&self) -> Bytes {
        match self {
            Self::Ping | Self::Ok => Bytes::new(),
            Self::Hello(m) => m.encode_to_vec().into(),
            Self::AuthorizeRequest(m) => m.encode_to_vec().into(),
            Self::AudioPayload(m) => m.encode_to_vec().into(),
            Self::StartPlayback(m) => m.encode_to_vec().into(),
            Self::StopPlayback(m) => m.encode_to_vec().into(),
            Self::Error(m) => m.encode_to_vec().into(),
            Self::PlaybackBegin(m) => m.encode_to_vec().into(),
            Self::PlaybackEnd(m) => m.encode_to_vec().into(),
            Self::PlaybackPacket(m) => m.encode_to_vec().into(),
            Self::Redirect(m) => m.encode_to_vec().into(),
            Self::Control { body, .. } | Self::Unknown { body, .. } => body.clone(),
        }
    }

    /// Build the frame carrying this packet.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        Frame {
            packet_type: self.packet_type(),
            body: self.encode_body(),
        }
    }

    /// Bounded label for logs and metrics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        PacketType::from_u8(self.packet_type()).map_or("unknown", PacketType::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::messages::{Channel, CodecType, ErrorCode, PlaybackEndReason};

    fn round_trip(packet: &Packet) -> Packet {
        let bytes = packet.to_frame().to_bytes().unwrap();
        let mut buffer = crate::frame::FrameBuffer::new();
        let mut frames = Vec::new();
        buffer.feed(&bytes, |f| frames.push(f)).unwrap();
        assert_eq!(frames.len(), 1);
        Packet::decode(frames.pop().unwrap()).unwrap()
    }

    #[test]
    fn test_playback_begin_through_frame_layer() {
        let begin = Packet::PlaybackBegin(PlaybackBegin {
            session_id: 42,
            channels: vec![
                Channel {
                    channel_id: 5,
                    codec_type: CodecType::H264 as i32,
                    ..Channel::default()
                },
                Channel {
                    channel_id: 7,
                    codec_type: CodecType::Aac as i32,
                    sample_rate: 48_000,
                    private_data: vec![Bytes::from_static(&[0x11, 0x90])],
                    ..Channel::default()
                },
            ],
            ..PlaybackBegin::default()
        });

        assert_eq!(round_trip(&begin), begin);
    }

    #[test]
    fn test_empty_bodies() {
        let frame = Frame::new(PacketType::Ok, Bytes::new());
        assert_eq!(Packet::decode(frame).unwrap(), Packet::Ok);

        let frame = Frame::new(PacketType::Ping, Bytes::new());
        assert_eq!(Packet::decode(frame).unwrap(), Packet::Ping);

        // An Error with no fields decodes to code 0 / empty message
        let frame = Frame::new(PacketType::Error, Bytes::new());
        let Packet::Error(err) = Packet::decode(frame).unwrap() else {
            unreachable!("expected error packet");
        };
        assert_eq!(err.code, 0);
        assert!(err.message.is_empty());
    }

    #[test]
    fn test_long_and_short_playback_packets_decode_alike() {
        let body = PlaybackPacket {
            channel_id: 5,
            payload: Bytes::from_static(b"nal"),
            ..PlaybackPacket::default()
        }
        .encode_to_vec();

        let short = Packet::decode(Frame::new(PacketType::PlaybackPacket, body.clone())).unwrap();
        let long = Packet::decode(Frame::new(PacketType::LongPlaybackPacket, body)).unwrap();
        assert_eq!(short, long);
    }

    #[test]
    fn test_large_playback_packet_uses_long_tag() {
        let packet = Packet::PlaybackPacket(PlaybackPacket {
            channel_id: 5,
            payload: Bytes::from(vec![0u8; 100_000]),
            ..PlaybackPacket::default()
        });
        assert_eq!(packet.packet_type(), PacketType::LongPlaybackPacket as u8);
        assert_eq!(round_trip(&packet), packet);
    }

    #[test]
    fn test_error_and_end_reason_values() {
        let err = Packet::Error(ErrorPacket {
            code: ErrorCode::AuthorizationFailed as i32,
            message: "token expired".to_string(),
        });
        assert_eq!(round_trip(&err), err);

        let end = Packet::PlaybackEnd(PlaybackEnd {
            session_id: 9,
            reason: PlaybackEndReason::ErrorTimeNotAvailable as i32,
        });
        assert_eq!(round_trip(&end), end);
    }

    #[test]
    fn test_truncated_body_is_malformed() {
        // Redirect.new_host declares 20 bytes, only 3 follow
        let frame = Frame::new(PacketType::Redirect, Bytes::from_static(&[0x0A, 0x14, b'a', b'b', b'c']));
        assert!(matches!(
            Packet::decode(frame),
            Err(CodecError::Malformed {
                packet_type: PacketType::Redirect,
                ..
            })
        ));
    }

    #[test]
    fn test_channel_count_is_bounded() {
        let begin = PlaybackBegin {
            session_id: 1,
            channels: vec![Channel::default(); MAX_CHANNELS + 1],
            ..PlaybackBegin::default()
        };
        let frame = Frame::new(PacketType::PlaybackBegin, begin.encode_to_vec());
        assert!(matches!(
            Packet::decode(frame),
            Err(CodecError::TooManyChannels(n)) if n == MAX_CHANNELS + 1
        ));
    }

    #[test]
    fn test_control_and_unknown_tags_pass_through() {
        let frame = Frame::new(PacketType::ClockSync, Bytes::from_static(b"\x08\x01"));
        assert!(matches!(
            Packet::decode(frame).unwrap(),
            Packet::Control {
                packet_type: PacketType::ClockSync,
                ..
            }
        ));

        let frame = Frame {
            packet_type: 77,
            body: Bytes::from_static(b"??"),
        };
        let packet = Packet::decode(frame).unwrap();
        assert_eq!(packet.packet_type(), 77);
        assert_eq!(packet.name(), "unknown");
    }
}
