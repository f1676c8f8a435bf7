//! Media sinks fed by a streaming session.
//!
//! A [`MediaSink`] is the input side of an external consumer (a transcoder's
//! stdin, a FIFO, a file). Writes never block the session: a chunk is handed
//! to a bounded queue drained by a writer task, and is dropped when the
//! queue is full or the consumer has gone away.

use crate::observability::metrics;
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Start code prepended to every H.264 NAL unit written to the video sink.
pub const NAL_START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Default number of chunks buffered per sink.
pub const DEFAULT_SINK_CAPACITY: usize = 256;

/// Which elementary stream a sink carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Video,
    Audio,
}

impl SinkKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SinkKind::Video => "video",
            SinkKind::Audio => "audio",
        }
    }
}

/// Writable end of one external consumer.
#[derive(Debug, Clone)]
pub struct MediaSink {
    kind: SinkKind,
    sender: mpsc::Sender<Bytes>,
    dropped: Arc<AtomicU64>,
}

impl MediaSink {
    /// Create a sink whose chunks are delivered to the returned receiver.
    #[must_use]
    pub fn channel(kind: SinkKind, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let sink = Self {
            kind,
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, receiver)
    }

    /// Create a sink that writes into `writer` from a background task.
    ///
    /// The task ends, shutting the writer down, when every clone of the sink
    /// is dropped or a write fails.
    pub fn spawn<W>(kind: SinkKind, writer: W, capacity: usize) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (sink, receiver) = Self::channel(kind, capacity);
        let task = tokio::spawn(run_writer(kind, writer, receiver));
        (sink, task)
    }

    #[must_use]
    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    /// Whether the consumer is still accepting input.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Chunks dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Queue a chunk for the consumer.
    ///
    /// Returns false when the chunk was dropped because the consumer has
    /// gone away or is not keeping up.
    pub fn write(&self, chunk: Bytes) -> bool {
        if !self.is_writable() {
            self.record_drop("closed");
            return false;
        }

        let len = chunk.len();
        match self.sender.try_send(chunk) {
            Ok(()) => {
                metrics::record_sink_bytes(self.kind.as_str(), len);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.record_drop("full");
                warn!(
                    target: "nexus.sink",
                    sink = self.kind.as_str(),
                    dropped = self.dropped(),
                    "Media chunk dropped due to backpressure"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.record_drop("closed");
                false
            }
        }
    }

    fn record_drop(&self, reason: &'static str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_sink_drop(self.kind.as_str(), reason);
    }
}

async fn run_writer<W>(kind: SinkKind, mut writer: W, mut receiver: mpsc::Receiver<Bytes>)
where
    W: AsyncWrite + Send + Unpin,
{
    while let Some(chunk) = receiver.recv().await {
        if let Err(e) = writer.write_all(&chunk).await {
            debug!(
                target: "nexus.sink",
                sink = kind.as_str(),
                error = %e,
                "Sink consumer closed its input"
            );
            // Dropping the receiver makes the sink report not writable.
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(target: "nexus.sink", sink = kind.as_str(), error = %e, "Sink shutdown failed");
    }
    debug!(target: "nexus.sink", sink = kind.as_str(), "Sink writer finished");
}

/// Readable source of return audio.
pub type TalkbackSource = Box<dyn AsyncRead + Send + Unpin>;

/// The byte streams tied to one playback session.
pub struct MediaSinks {
    pub video: MediaSink,
    pub audio: Option<MediaSink>,
    pub talkback: Option<TalkbackSource>,
}

impl MediaSinks {
    #[must_use]
    pub fn new(video: MediaSink) -> Self {
        Self {
            video,
            audio: None,
            talkback: None,
        }
    }

    #[must_use]
    pub fn with_audio(mut self, audio: MediaSink) -> Self {
        self.audio = Some(audio);
        self
    }

    #[must_use]
    pub fn with_talkback<R>(mut self, source: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.talkback = Some(Box::new(source));
        self
    }
}

impl std::fmt::Debug for MediaSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSinks")
            .field("video", &self.video)
            .field("audio", &self.audio)
            .field("talkback", &self.talkback.is_some())
            .finish()
    }
}

/// Routes playback payloads to sinks by the channel ids a `PlaybackBegin`
/// declared.
#[derive(Debug)]
pub(crate) struct MediaRouter {
    video: Option<MediaSink>,
    audio: Option<MediaSink>,
    video_channel: Option<u32>,
    audio_channel: Option<u32>,
}

impl MediaRouter {
    pub(crate) fn new(video: MediaSink, audio: Option<MediaSink>) -> Self {
        Self {
            video: Some(video),
            audio,
            video_channel: None,
            audio_channel: None,
        }
    }

    pub(crate) fn has_audio_sink(&self) -> bool {
        self.audio.is_some()
    }

    pub(crate) fn video_channel(&self) -> Option<u32> {
        self.video_channel
    }

    pub(crate) fn audio_channel(&self) -> Option<u32> {
        self.audio_channel
    }

    pub(crate) fn set_video_channel(&mut self, channel_id: u32) {
        self.video_channel = Some(channel_id);
    }

    pub(crate) fn set_audio_channel(&mut self, channel_id: u32) {
        self.audio_channel = Some(channel_id);
    }

    /// Forget the channel ids of the previous playback attempt.
    pub(crate) fn reset_channels(&mut self) {
        self.video_channel = None;
        self.audio_channel = None;
    }

    /// Deliver one payload. Payloads on undeclared channels are dropped.
    ///
    /// Returns the sink the payload was routed to, if any.
    pub(crate) fn route(&self, channel_id: u32, payload: &[u8]) -> Option<SinkKind> {
        if self.video_channel == Some(channel_id) {
            let sink = self.video.as_ref()?;
            let mut chunk = BytesMut::with_capacity(NAL_START_CODE.len() + payload.len());
            chunk.put_slice(&NAL_START_CODE);
            chunk.put_slice(payload);
            sink.write(chunk.freeze());
            return Some(SinkKind::Video);
        }

        if self.audio_channel == Some(channel_id) {
            let sink = self.audio.as_ref()?;
            sink.write(Bytes::copy_from_slice(payload));
            return Some(SinkKind::Audio);
        }

        None
    }

    /// Release the sinks so their writer tasks shut the consumers down.
    pub(crate) fn close(&mut self) {
        self.reset_channels();
        self.video = None;
        self.audio = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_route_video_prepends_start_code() {
        let (video, mut video_rx) = MediaSink::channel(SinkKind::Video, 8);
        let (audio, mut audio_rx) = MediaSink::channel(SinkKind::Audio, 8);
        let mut router = MediaRouter::new(video, Some(audio));
        router.set_video_channel(5);
        router.set_audio_channel(7);

        assert_eq!(router.route(5, b"\x65\x88"), Some(SinkKind::Video));
        assert_eq!(router.route(7, b"\x21\x10"), Some(SinkKind::Audio));

        assert_eq!(
            video_rx.try_recv().unwrap(),
            Bytes::from_static(&[0, 0, 0, 1, 0x65, 0x88])
        );
        assert_eq!(audio_rx.try_recv().unwrap(), Bytes::from_static(b"\x21\x10"));
    }

    #[test]
    fn test_route_unknown_channel_is_dropped() {
        let (video, mut video_rx) = MediaSink::channel(SinkKind::Video, 8);
        let mut router = MediaRouter::new(video, None);
        router.set_video_channel(5);

        assert_eq!(router.route(9, b"data"), None);
        assert!(video_rx.try_recv().is_err());
    }

    #[test]
    fn test_route_before_channels_declared() {
        let (video, mut video_rx) = MediaSink::channel(SinkKind::Video, 8);
        let router = MediaRouter::new(video, None);

        assert_eq!(router.route(0, b"data"), None);
        assert!(video_rx.try_recv().is_err());
    }

    #[test]
    fn test_reset_channels_stops_routing() {
        let (video, mut video_rx) = MediaSink::channel(SinkKind::Video, 8);
        let mut router = MediaRouter::new(video, None);
        router.set_video_channel(5);
        router.reset_channels();

        assert_eq!(router.route(5, b"data"), None);
        assert!(video_rx.try_recv().is_err());
        assert_eq!(router.video_channel(), None);
    }

    #[test]
    fn test_write_after_consumer_gone_is_dropped_silently() {
        let (video, video_rx) = MediaSink::channel(SinkKind::Video, 8);
        drop(video_rx);

        assert!(!video.is_writable());
        assert!(!video.write(Bytes::from_static(b"frame")));
        assert_eq!(video.dropped(), 1);
    }

    #[test]
    fn test_write_to_full_sink_is_dropped() {
        let (audio, mut audio_rx) = MediaSink::channel(SinkKind::Audio, 1);

        assert!(audio.write(Bytes::from_static(b"one")));
        assert!(!audio.write(Bytes::from_static(b"two")));
        assert!(audio.is_writable());
        assert_eq!(audio.dropped(), 1);
        assert_eq!(audio_rx.try_recv().unwrap(), Bytes::from_static(b"one"));
    }

    #[test]
    fn test_close_releases_sinks() {
        let (video, mut video_rx) = MediaSink::channel(SinkKind::Video, 8);
        let mut router = MediaRouter::new(video, None);
        router.close();

        assert!(matches!(
            video_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_spawned_writer_delivers_and_shuts_down() {
        let (writer, mut reader) = tokio::io::duplex(64);
        let (sink, task) = MediaSink::spawn(SinkKind::Video, writer, 8);

        assert!(sink.write(Bytes::from_static(b"abc")));
        assert!(sink.write(Bytes::from_static(b"def")));
        drop(sink);
        task.await.unwrap();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abcdef");
    }

    #[tokio::test]
    async fn test_spawned_writer_stops_when_consumer_exits() {
        let (writer, reader) = tokio::io::duplex(64);
        let (sink, task) = MediaSink::spawn(SinkKind::Audio, writer, 8);
        drop(reader);

        sink.write(Bytes::from_static(b"lost"));
        task.await.unwrap();

        assert!(!sink.is_writable());
        assert!(!sink.write(Bytes::from_static(b"after exit")));
    }
}
