//! Session fixtures.

use bytes::Bytes;
use common::secret::SecretString;
use common::token::{token_channel, TokenPublisher, TokenReceiver};
use nexus_streamer::sink::{MediaSink, MediaSinks, SinkKind};
use nexus_streamer::transport::Connector;
use nexus_streamer::{SessionConfig, StreamSession, StreamSessionHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Session id used by [`test_session_config`].
pub const TEST_SESSION_ID: u32 = 42;

/// Camera uuid used by [`test_session_config`].
pub const TEST_CAMERA_UUID: &str = "camera-uuid-1";

/// Access token seeded into [`test_token`].
pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

/// Sink capacity for [`TestSinks`].
pub const TEST_SINK_CAPACITY: usize = 64;

/// Session settings with a fixed session id.
///
/// Timers keep their production values so paused-time tests exercise the
/// real intervals.
#[must_use]
pub fn test_session_config(host: &str) -> SessionConfig {
    SessionConfig::new(host, TEST_CAMERA_UUID).with_session_id(TEST_SESSION_ID)
}

/// Token channel seeded with [`TEST_ACCESS_TOKEN`].
#[must_use]
pub fn test_token() -> (TokenPublisher, TokenReceiver) {
    token_channel(SecretString::from(TEST_ACCESS_TOKEN))
}

/// Channel-backed sinks with their receiving ends.
pub struct TestSinks {
    pub sinks: MediaSinks,
    pub video: mpsc::Receiver<Bytes>,
    pub audio: mpsc::Receiver<Bytes>,
}

impl TestSinks {
    /// Video and audio sinks, no talkback source.
    #[must_use]
    pub fn new() -> Self {
        let (video_sink, video) = MediaSink::channel(SinkKind::Video, TEST_SINK_CAPACITY);
        let (audio_sink, audio) = MediaSink::channel(SinkKind::Audio, TEST_SINK_CAPACITY);
        Self {
            sinks: MediaSinks::new(video_sink).with_audio(audio_sink),
            video,
            audio,
        }
    }
}

impl Default for TestSinks {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive the next chunk from a sink receiver.
///
/// # Panics
///
/// Panics on timeout or if the sink closed.
pub async fn next_chunk(receiver: &mut mpsc::Receiver<Bytes>) -> Bytes {
    tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("timed out waiting for a sink chunk")
        .expect("sink closed")
}

/// Spawn a session with a fresh cancellation token.
pub fn spawn_session(
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    token: TokenReceiver,
    sinks: MediaSinks,
) -> (StreamSessionHandle, JoinHandle<()>) {
    StreamSession::spawn(config, connector, token, sinks, CancellationToken::new())
}
