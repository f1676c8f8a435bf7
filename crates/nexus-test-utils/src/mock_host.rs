//! Scripted streaming host.
//!
//! The host side of one accepted mock connection. Tests read what the
//! session sent and script the host's replies packet by packet.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use nexus_protocol::messages::{
    Channel, CodecType, ErrorCode, ErrorPacket, Hello, PlaybackBegin, PlaybackEnd,
    PlaybackEndReason, PlaybackPacket, Redirect, StartPlayback,
};
use nexus_protocol::{Frame, NexusCodec, Packet, PacketType};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::codec::Framed;

/// How long `recv_packet` waits by default.
pub const DEFAULT_RECV_WAIT: Duration = Duration::from_secs(5);

/// Host side of a mock connection.
#[derive(Debug)]
pub struct MockNexusHost {
    host: String,
    framed: Framed<DuplexStream, NexusCodec>,
}

impl MockNexusHost {
    pub(crate) fn new(host: String, stream: DuplexStream) -> Self {
        Self {
            host,
            framed: Framed::new(stream, NexusCodec::default()),
        }
    }

    /// Host name the session connected to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    // ------------------------------------------------------------------
    // Reading what the session sent
    // ------------------------------------------------------------------

    /// Receive the next packet, waiting up to `wait`.
    ///
    /// Returns `None` on timeout or when the session closed the connection.
    ///
    /// # Panics
    ///
    /// Panics if the session sent a malformed frame.
    pub async fn try_recv_packet(&mut self, wait: Duration) -> Option<Packet> {
        match tokio::time::timeout(wait, self.framed.next()).await {
            Ok(Some(frame)) => {
                let frame = frame.expect("session sent an invalid frame");
                Some(Packet::decode(frame).expect("session sent a malformed packet"))
            }
            Ok(None) | Err(_) => None,
        }
    }

    /// Receive the next packet.
    ///
    /// # Panics
    ///
    /// Panics on timeout or if the connection closed.
    pub async fn recv_packet(&mut self) -> Packet {
        self.try_recv_packet(DEFAULT_RECV_WAIT)
            .await
            .expect("timed out waiting for a packet, or connection closed")
    }

    /// Receive the session's `Hello`.
    ///
    /// # Panics
    ///
    /// Panics if the next packet is anything else.
    pub async fn expect_hello(&mut self) -> Hello {
        match self.recv_packet().await {
            Packet::Hello(hello) => hello,
            other => panic!("expected Hello, got {other:?}"),
        }
    }

    /// Receive a `StartPlayback`.
    ///
    /// # Panics
    ///
    /// Panics if the next packet is anything else.
    pub async fn expect_start_playback(&mut self) -> StartPlayback {
        match self.recv_packet().await {
            Packet::StartPlayback(request) => request,
            other => panic!("expected StartPlayback, got {other:?}"),
        }
    }

    /// Read until the session closes the connection, returning every packet
    /// it sent first.
    ///
    /// # Panics
    ///
    /// Panics if the connection stays open for [`DEFAULT_RECV_WAIT`].
    pub async fn expect_closed(&mut self) -> Vec<Packet> {
        let drain = async {
            let mut packets = Vec::new();
            while let Some(frame) = self.framed.next().await {
                match frame {
                    Ok(frame) => packets.push(
                        Packet::decode(frame).expect("session sent a malformed packet"),
                    ),
                    Err(_) => break,
                }
            }
            packets
        };
        tokio::time::timeout(DEFAULT_RECV_WAIT, drain)
            .await
            .expect("connection was not closed")
    }

    /// Assert the session sends nothing within `wait`.
    ///
    /// # Panics
    ///
    /// Panics if a packet arrives.
    pub async fn assert_no_packet(&mut self, wait: Duration) {
        if let Some(packet) = self.try_recv_packet(wait).await {
            panic!("unexpected packet: {packet:?}");
        }
    }

    // ------------------------------------------------------------------
    // Scripting the host's replies
    // ------------------------------------------------------------------

    /// Send a packet to the session.
    ///
    /// # Panics
    ///
    /// Panics if the session side is gone.
    pub async fn send(&mut self, packet: Packet) {
        self.send_frame(packet.to_frame()).await;
    }

    /// Send a raw frame to the session.
    ///
    /// # Panics
    ///
    /// Panics if the session side is gone.
    pub async fn send_frame(&mut self, frame: Frame) {
        self.framed
            .send(frame)
            .await
            .expect("failed to send frame to session");
    }

    /// Write raw bytes, bypassing frame encoding.
    ///
    /// # Panics
    ///
    /// Panics if the session side is gone.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        let stream = self.framed.get_mut();
        stream
            .write_all(bytes)
            .await
            .expect("failed to write raw bytes");
        stream.flush().await.expect("failed to flush raw bytes");
    }

    pub async fn send_ok(&mut self) {
        self.send(Packet::Ok).await;
    }

    pub async fn send_error(&mut self, code: ErrorCode, message: &str) {
        self.send(Packet::Error(ErrorPacket {
            code: code as i32,
            message: message.to_string(),
        }))
        .await;
    }

    /// Declare the playback channels for `session_id`.
    pub async fn send_playback_begin(&mut self, session_id: u32, channels: &[(u32, CodecType)]) {
        let channels = channels
            .iter()
            .map(|&(channel_id, codec)| Channel {
                channel_id,
                codec_type: codec as i32,
                ..Channel::default()
            })
            .collect();
        self.send(Packet::PlaybackBegin(PlaybackBegin {
            session_id,
            channels,
            ..PlaybackBegin::default()
        }))
        .await;
    }

    pub async fn send_playback_packet(&mut self, session_id: u32, channel_id: u32, payload: &[u8]) {
        self.send(Packet::PlaybackPacket(PlaybackPacket {
            session_id,
            channel_id,
            payload: Bytes::copy_from_slice(payload),
            ..PlaybackPacket::default()
        }))
        .await;
    }

    /// Send a playback packet with the 4-byte length header regardless of size.
    pub async fn send_long_playback_packet(
        &mut self,
        session_id: u32,
        channel_id: u32,
        payload: &[u8],
    ) {
        let packet = Packet::PlaybackPacket(PlaybackPacket {
            session_id,
            channel_id,
            payload: Bytes::copy_from_slice(payload),
            ..PlaybackPacket::default()
        });
        self.send_frame(Frame::new(
            PacketType::LongPlaybackPacket,
            packet.encode_body(),
        ))
        .await;
    }

    pub async fn send_playback_end(&mut self, session_id: u32, reason: PlaybackEndReason) {
        self.send(Packet::PlaybackEnd(PlaybackEnd {
            session_id,
            reason: reason as i32,
        }))
        .await;
    }

    pub async fn send_redirect(&mut self, new_host: &str) {
        self.send(Packet::Redirect(Redirect {
            new_host: new_host.to_string(),
            is_transcode: false,
        }))
        .await;
    }
}
