//! Frame layer: reassembly of length-prefixed frames from a byte stream.
//!
//! Bytes arrive from the socket in arbitrary chunks. A frame is only handed
//! out once the whole body is buffered; any trailing bytes stay buffered as
//! the start of the next frame.

use crate::packet::PacketType;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Header size for every frame type except `LONG_PLAYBACK_PACKET`.
pub const SHORT_HEADER_LEN: usize = 3;

/// Header size for `LONG_PLAYBACK_PACKET` frames.
pub const LONG_HEADER_LEN: usize = 5;

/// Default upper bound on a declared body length (16 MiB).
pub const DEFAULT_MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// Error type for frame operations
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Declared body length is beyond the configured maximum
    #[error("Declared body length {declared} for packet type {packet_type} exceeds maximum {max}")]
    Oversized {
        packet_type: u8,
        declared: usize,
        max: usize,
    },

    /// Body cannot be expressed with this frame type's length field
    #[error("Body of {len} bytes does not fit a frame of packet type {packet_type}")]
    BodyTooLarge { packet_type: u8, len: usize },

    /// Underlying stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single wire unit: type tag and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw type tag (may be a tag this crate does not know)
    pub packet_type: u8,
    /// Message body
    pub body: Bytes,
}

impl Frame {
    /// Create a frame for a known packet type.
    #[must_use]
    pub fn new(packet_type: PacketType, body: impl Into<Bytes>) -> Self {
        Self {
            packet_type: packet_type.into(),
            body: body.into(),
        }
    }

    /// The packet type, if the tag is known.
    #[must_use]
    pub const fn kind(&self) -> Option<PacketType> {
        PacketType::from_u8(self.packet_type)
    }

    /// Header length for a given type tag.
    #[must_use]
    pub const fn header_len(packet_type: u8) -> usize {
        match PacketType::from_u8(packet_type) {
            Some(kind) if kind.has_long_length() => LONG_HEADER_LEN,
            _ => SHORT_HEADER_LEN,
        }
    }

    /// Total size of the frame on the wire.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        Self::header_len(self.packet_type) + self.body.len()
    }

    /// Append the wire encoding of this frame to `dst`.
    ///
    /// # Errors
    ///
    /// Returns `BodyTooLarge` if the body does not fit the length field.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), FrameError> {
        let len = self.body.len();
        let too_large = || FrameError::BodyTooLarge {
            packet_type: self.packet_type,
            len,
        };

        dst.reserve(self.encoded_len());
        dst.put_u8(self.packet_type);
        if Self::header_len(self.packet_type) == LONG_HEADER_LEN {
            dst.put_u32(u32::try_from(len).map_err(|_| too_large())?);
        } else {
            dst.put_u16(u16::try_from(len).map_err(|_| too_large())?);
        }
        dst.extend_from_slice(&self.body);
        Ok(())
    }

    /// Encode this frame into a standalone buffer.
    ///
    /// # Errors
    ///
    /// Returns `BodyTooLarge` if the body does not fit the length field.
    pub fn to_bytes(&self) -> Result<Bytes, FrameError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Big-endian length of 2 or 4 bytes.
fn read_length(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | usize::from(b))
}

/// Split one complete frame off the front of `src`, if one is buffered.
///
/// Returns `Ok(None)` when more bytes are needed. The oversize check runs as
/// soon as the header is available so a hostile length never causes the
/// caller to wait for (or buffer) the body.
fn take_frame(src: &mut BytesMut, max_body_len: usize) -> Result<Option<Frame>, FrameError> {
    let Some(&packet_type) = src.first() else {
        return Ok(None);
    };
    let header_len = Frame::header_len(packet_type);
    let Some(length_bytes) = src.get(1..header_len) else {
        return Ok(None);
    };

    let body_len = read_length(length_bytes);
    if body_len > max_body_len {
        return Err(FrameError::Oversized {
            packet_type,
            declared: body_len,
            max: max_body_len,
        });
    }

    if src.len() < header_len + body_len {
        return Ok(None);
    }

    src.advance(header_len);
    let body = src.split_to(body_len).freeze();
    Ok(Some(Frame { packet_type, body }))
}

/// Receive buffer that reassembles frames fed from a socket.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_body_len: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Create an empty buffer with the default body limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_body_len(DEFAULT_MAX_BODY_LEN)
    }

    /// Create an empty buffer with a custom body limit.
    #[must_use]
    pub fn with_max_body_len(max_body_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_body_len,
        }
    }

    /// Append raw bytes read from the connection.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take the next complete frame, if any.
    ///
    /// # Errors
    ///
    /// Returns `Oversized` for a declared length beyond the limit. The buffer
    /// is cleared in that case since the stream can no longer be trusted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        match take_frame(&mut self.buf, self.max_body_len) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                warn!(
                    target: "nexus.frame",
                    error = %e,
                    buffered = self.buf.len(),
                    "Discarding receive buffer after framing violation"
                );
                self.buf.clear();
                Err(e)
            }
        }
    }

    /// Append `data` and hand every complete frame to `dispatch`, in order.
    ///
    /// Returns the number of frames dispatched.
    ///
    /// # Errors
    ///
    /// Returns the first framing violation; frames before it have already
    /// been dispatched.
    pub fn feed<F>(&mut self, data: &[u8], mut dispatch: F) -> Result<usize, FrameError>
    where
        F: FnMut(Frame),
    {
        self.extend(data);

        let mut dispatched = 0;
        while let Some(frame) = self.next_frame()? {
            dispatch(frame);
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// Number of bytes buffered but not yet part of a complete frame.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// `tokio_util` codec for framed reads and writes over a byte stream.
#[derive(Debug, Clone, Copy)]
pub struct NexusCodec {
    max_body_len: usize,
}

impl Default for NexusCodec {
    fn default() -> Self {
        Self {
            max_body_len: DEFAULT_MAX_BODY_LEN,
        }
    }
}

impl NexusCodec {
    /// Create a codec with a custom body limit.
    #[must_use]
    pub const fn with_max_body_len(max_body_len: usize) -> Self {
        Self { max_body_len }
    }
}

impl Decoder for NexusCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        take_frame(src, self.max_body_len)
    }
}

impl Encoder<Frame> for NexusCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        frame.encode(dst)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    fn sample_frames() -> Vec<Frame> {
        vec![
            Frame::new(PacketType::Hello, Bytes::new()),
            Frame::new(PacketType::Ok, Bytes::from_static(b"\x08\x01")),
            Frame::new(PacketType::PlaybackPacket, Bytes::from(vec![0xAB; 300])),
            Frame::new(PacketType::LongPlaybackPacket, Bytes::from(vec![0x42; 70_000])),
            Frame::new(PacketType::Ping, Bytes::new()),
            Frame {
                packet_type: 250,
                body: Bytes::from_static(b"unknown"),
            },
        ]
    }

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            frame.encode(&mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn feed_in_chunks(data: &[u8], chunk_size: usize) -> Vec<Frame> {
        let mut buffer = FrameBuffer::new();
        let mut out = Vec::new();
        for chunk in data.chunks(chunk_size) {
            buffer.feed(chunk, |f| out.push(f)).unwrap();
        }
        assert_eq!(buffer.buffered_len(), 0);
        out
    }

    #[test]
    fn test_header_layout() {
        let bytes = Frame::new(PacketType::Hello, Bytes::from_static(b"abc"))
            .to_bytes()
            .unwrap();
        assert_eq!(&bytes[..], &[100, 0x00, 0x03, b'a', b'b', b'c']);

        let bytes = Frame::new(PacketType::LongPlaybackPacket, Bytes::from_static(b"x"))
            .to_bytes()
            .unwrap();
        assert_eq!(&bytes[..], &[205, 0x00, 0x00, 0x00, 0x01, b'x']);
    }

    #[test]
    fn test_only_long_playback_tag_takes_long_header() {
        assert_eq!(Frame::header_len(205), LONG_HEADER_LEN);
        assert_eq!(Frame::header_len(204), SHORT_HEADER_LEN);
        assert_eq!(Frame::header_len(100), SHORT_HEADER_LEN);
        // Unknown tags still frame with the short header.
        assert_eq!(Frame::header_len(250), SHORT_HEADER_LEN);
    }

    #[test]
    fn test_any_chunking_yields_same_frames_in_order() {
        let frames = sample_frames();
        let data = wire(&frames);

        for chunk_size in [1, 2, 3, 5, 7, 64, 4096, data.len()] {
            assert_eq!(
                feed_in_chunks(&data, chunk_size),
                frames,
                "chunk size {chunk_size}"
            );
        }
    }

    #[test]
    fn test_partial_frame_waits_for_rest_of_body() {
        let frame = Frame::new(PacketType::PlaybackPacket, Bytes::from_static(b"0123456789"));
        let data = frame.to_bytes().unwrap();

        let mut buffer = FrameBuffer::new();
        let mut out = Vec::new();

        // Header plus a prefix of the body
        let dispatched = buffer.feed(&data[..7], |f| out.push(f)).unwrap();
        assert_eq!(dispatched, 0);
        assert!(out.is_empty());
        assert_eq!(buffer.buffered_len(), 7);

        let dispatched = buffer.feed(&data[7..], |f| out.push(f)).unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(out, vec![frame]);
        assert_eq!(buffer.buffered_len(), 0);
    }

    #[test]
    fn test_partial_header_waits() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.feed(&[205, 0x00, 0x00], |_| panic!("no frame yet")).is_ok());
        assert_eq!(buffer.buffered_len(), 3);
    }

    #[test]
    fn test_empty_hello_frame() {
        let mut buffer = FrameBuffer::new();
        let mut out = Vec::new();

        buffer.feed(&[0x64, 0x00, 0x00], |f| out.push(f)).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].packet_type, 100);
        assert!(out[0].body.is_empty());
        assert_eq!(buffer.buffered_len(), 0);
    }

    #[test]
    fn test_trailing_bytes_stay_buffered() {
        let mut data = wire(&[Frame::new(PacketType::Ping, Bytes::new())]);
        data.extend_from_slice(&[204, 0x00]);

        let mut buffer = FrameBuffer::new();
        let mut out = Vec::new();
        buffer.feed(&data, |f| out.push(f)).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(buffer.buffered_len(), 2);
    }

    #[test]
    fn test_oversized_long_packet_fails_without_body() {
        let mut buffer = FrameBuffer::new();
        // 256 MiB declared, only the header is present
        let result = buffer.feed(&[205, 0x10, 0x00, 0x00, 0x00], |_| panic!("no dispatch"));

        assert!(matches!(
            result,
            Err(FrameError::Oversized {
                packet_type: 205,
                declared: 0x1000_0000,
                ..
            })
        ));
        assert_eq!(buffer.buffered_len(), 0);
    }

    #[test]
    fn test_custom_limit_applies_to_short_frames() {
        let mut buffer = FrameBuffer::with_max_body_len(4);
        let result = buffer.feed(&[204, 0x00, 0x05], |_| {});
        assert!(matches!(result, Err(FrameError::Oversized { declared: 5, .. })));
    }

    #[test]
    fn test_frames_before_violation_are_dispatched() {
        let mut data = wire(&[Frame::new(PacketType::Ok, Bytes::new())]);
        data.extend_from_slice(&[205, 0xFF, 0xFF, 0xFF, 0xFF]);

        let mut buffer = FrameBuffer::new();
        let mut out = Vec::new();
        let result = buffer.feed(&data, |f| out.push(f));

        assert!(result.is_err());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_many_tiny_frames_in_one_read() {
        let frames = vec![Frame::new(PacketType::Ping, Bytes::new()); 100_000];
        let data = wire(&frames);

        let mut buffer = FrameBuffer::new();
        let dispatched = buffer.feed(&data, |_| {}).unwrap();
        assert_eq!(dispatched, 100_000);
    }

    #[test]
    fn test_short_frame_rejects_large_body() {
        let frame = Frame::new(PacketType::AudioPayload, Bytes::from(vec![0; 70_000]));
        assert!(matches!(
            frame.to_bytes(),
            Err(FrameError::BodyTooLarge {
                packet_type: 102,
                len: 70_000
            })
        ));
    }

    #[test]
    fn test_codec_decoder_matches_frame_buffer() {
        let frames = sample_frames();
        let mut src = BytesMut::from(&wire(&frames)[..]);
        let mut codec = NexusCodec::default();

        let mut out = Vec::new();
        while let Some(frame) = codec.decode(&mut src).unwrap() {
            out.push(frame);
        }
        assert_eq!(out, frames);
    }

    #[test]
    fn test_codec_encoder() {
        let mut codec = NexusCodec::default();
        let mut dst = BytesMut::new();
        codec
            .encode(Frame::new(PacketType::Ping, Bytes::new()), &mut dst)
            .unwrap();
        assert_eq!(&dst[..], &[1, 0, 0]);
    }
}
