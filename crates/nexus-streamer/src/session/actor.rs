//! `StreamSession` - per-playback session actor.
//!
//! Each `StreamSession`:
//! - Owns at most one connection to the streaming host, and its keepalive
//! - Gates outbound packets on connection readiness, then on authorization
//! - Dispatches decoded packets and routes media payloads to the sinks
//! - Follows redirects and re-authorizes in place
//!
//! # Lifecycle
//!
//! 1. Spawned idle (`Disconnected`) with its sinks
//! 2. `start_playback` connects and requests playback
//! 3. Runs until `stop_playback`, cancellation, or every handle is dropped

use super::messages::{SessionMessage, SessionState, SessionStatus};
use super::writer::{ConnectionWriter, Enqueue};
use super::{SessionConfig, TALKBACK_CODEC, TALKBACK_SAMPLE_RATE};
use crate::errors::StreamerError;
use crate::observability::metrics;
use crate::sink::{MediaRouter, MediaSinks};
use crate::talkback;
use crate::transport::{ConnectFuture, Connector, NexusStream};

use bytes::{Bytes, BytesMut};
use common::token::TokenReceiver;
use nexus_protocol::messages::{
    AudioPayload, AuthorizeRequest, CodecType, ErrorPacket, Hello, PlaybackBegin, PlaybackEnd,
    PlaybackEndReason, PlaybackPacket, ProtocolVersion, Redirect, StopPlayback,
};
use nexus_protocol::{Frame, FrameBuffer, Packet, PacketType};
use prost::Message;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

/// Default channel buffer size for the session mailbox.
const SESSION_CHANNEL_BUFFER: usize = 64;

/// Bytes reserved for each socket read.
const READ_CHUNK: usize = 16 * 1024;

/// Handle to a `StreamSession`.
#[derive(Clone, Debug)]
pub struct StreamSessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    session_id: u32,
}

impl StreamSessionHandle {
    /// Get the session ID.
    #[must_use]
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Request playback. Connects first when no connection exists.
    ///
    /// # Errors
    ///
    /// Returns `StreamerError::ChannelClosed` if the session has ended.
    pub async fn start_playback(&self) -> Result<(), StreamerError> {
        self.sender
            .send(SessionMessage::StartPlayback)
            .await
            .map_err(|_| StreamerError::ChannelClosed)
    }

    /// Stop playback and end the session, waiting until the connection and
    /// sinks are closed.
    ///
    /// # Errors
    ///
    /// Returns `StreamerError::ChannelClosed` if the session has already ended.
    pub async fn stop_playback(&self) -> Result<(), StreamerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::StopPlayback { respond_to: tx })
            .await
            .map_err(|_| StreamerError::ChannelClosed)?;

        rx.await.map_err(|_| StreamerError::ChannelClosed)
    }

    /// Get a status snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StreamerError::ChannelClosed` if the session has ended.
    pub async fn status(&self) -> Result<SessionStatus, StreamerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|_| StreamerError::ChannelClosed)?;

        rx.await.map_err(|_| StreamerError::ChannelClosed)
    }

    /// Cancel the session actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The live connection: the read half polled by the actor, and the queue
/// feeding the writer task that owns the write half.
struct Connection {
    reader: ReadHalf<NexusStream>,
    writer: ConnectionWriter,
}

/// The `StreamSession` implementation.
pub struct StreamSession {
    /// Session settings.
    config: SessionConfig,
    /// Current streaming host (updated on redirect).
    host: String,
    /// Opens connections.
    connector: Arc<dyn Connector>,
    /// Latest access token.
    token: TokenReceiver,
    /// Message receiver.
    receiver: mpsc::Receiver<SessionMessage>,
    /// Cancellation token.
    cancel_token: CancellationToken,
    /// Cancels the talkback forwarder.
    talkback_cancel: CancellationToken,
    /// Talkback forwarder task, if a source was given.
    talkback_task: Option<JoinHandle<()>>,
    state: SessionState,
    /// Live connection.
    connection: Option<Connection>,
    /// Connection attempt in progress.
    connecting: Option<ConnectFuture>,
    /// Reassembles frames from socket reads.
    frames: FrameBuffer,
    /// Scratch buffer for socket reads.
    read_buf: BytesMut,
    /// Frames waiting for the connection or for authorization.
    pending: VecDeque<Frame>,
    authorized: bool,
    /// Playback requested by the caller.
    started: bool,
    /// `PlaybackBegin` received for the current attempt.
    playback_confirmed: bool,
    /// The one retry after "time not available" has been used.
    playback_retried: bool,
    /// Channel routing and sinks.
    router: MediaRouter,
    /// Keepalive timer, present while connected.
    ping: Option<Interval>,
    /// Pending playback retry.
    playback_retry: Option<Pin<Box<Sleep>>>,
    redirects: u64,
    reauthorizations: u64,
}

async fn poll_connect(
    connecting: &mut Option<ConnectFuture>,
) -> Result<NexusStream, StreamerError> {
    match connecting {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn read_some(
    connection: &mut Option<Connection>,
    buf: &mut BytesMut,
) -> std::io::Result<usize> {
    match connection {
        Some(connection) => {
            buf.reserve(READ_CHUNK);
            connection.reader.read_buf(buf).await
        }
        None => std::future::pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn expire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

impl StreamSession {
    /// Spawn a new session actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        token: TokenReceiver,
        sinks: MediaSinks,
        cancel_token: CancellationToken,
    ) -> (StreamSessionHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);

        let MediaSinks {
            video,
            audio,
            talkback: talkback_source,
        } = sinks;

        let talkback_cancel = cancel_token.child_token();
        let talkback_task = talkback_source.map(|source| {
            talkback::spawn(
                source,
                sender.downgrade(),
                talkback_cancel.clone(),
                config.talkback_debounce,
            )
        });

        let session_id = config.session_id;
        let actor = Self {
            host: config.host.clone(),
            frames: FrameBuffer::with_max_body_len(config.max_frame_bytes),
            config,
            connector,
            token,
            receiver,
            cancel_token: cancel_token.clone(),
            talkback_cancel,
            talkback_task,
            state: SessionState::Disconnected,
            connection: None,
            connecting: None,
            read_buf: BytesMut::new(),
            pending: VecDeque::new(),
            authorized: false,
            started: false,
            playback_confirmed: false,
            playback_retried: false,
            router: MediaRouter::new(video, audio),
            ping: None,
            playback_retry: None,
            redirects: 0,
            reauthorizations: 0,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = StreamSessionHandle {
            sender,
            cancel_token,
            session_id,
        };

        (handle, task_handle)
    }

    /// Run the actor event loop.
    #[instrument(
        skip_all,
        name = "nexus.session",
        fields(session_id = self.config.session_id, host = %self.host)
    )]
    async fn run(mut self) {
        metrics::session_started();
        debug!(
            target: "nexus.session",
            session_id = self.config.session_id,
            "StreamSession started"
        );

        loop {
            tokio::select! {
                // Handle cancellation
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "nexus.session",
                        session_id = self.config.session_id,
                        "StreamSession received cancellation signal"
                    );
                    self.stop();
                    break;
                }

                // Handle messages
                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            if self.handle_message(message) {
                                break;
                            }
                        }
                        None => {
                            debug!(
                                target: "nexus.session",
                                session_id = self.config.session_id,
                                "StreamSession channel closed, exiting"
                            );
                            self.stop();
                            break;
                        }
                    }
                }

                result = poll_connect(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connect_result(result);
                }

                result = read_some(&mut self.connection, &mut self.read_buf) => {
                    self.on_read(result);
                }

                () = tick(&mut self.ping) => {
                    self.send_ping();
                }

                () = expire(&mut self.playback_retry) => {
                    self.playback_retry = None;
                    self.retry_playback();
                }
            }
        }

        self.talkback_cancel.cancel();
        if let Some(task) = self.talkback_task.take() {
            task.abort();
        }
        metrics::session_ended();

        info!(
            target: "nexus.session",
            session_id = self.config.session_id,
            host = %self.host,
            redirects = self.redirects,
            reauthorizations = self.reauthorizations,
            "StreamSession stopped"
        );
    }

    /// Handle a single message. Returns true if the actor should exit.
    fn handle_message(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::StartPlayback => {
                self.start_playback();
                false
            }

            SessionMessage::StopPlayback { respond_to } => {
                self.stop();
                let _ = respond_to.send(());
                true
            }

            SessionMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.status());
                false
            }

            SessionMessage::Talkback { payload } => {
                self.send_talkback(payload);
                false
            }
        }
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.config.session_id,
            state: self.state,
            host: self.host.clone(),
            authorized: self.authorized,
            started: self.started,
            video_channel: self.router.video_channel(),
            audio_channel: self.router.audio_channel(),
            pending_messages: self.pending.len(),
            redirects: self.redirects,
            reauthorizations: self.reauthorizations,
        }
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    fn connect(&mut self) {
        info!(
            target: "nexus.session",
            session_id = self.config.session_id,
            host = %self.host,
            "Connecting to streaming host"
        );
        self.state = SessionState::Connecting;
        self.connecting = Some(self.connector.connect(&self.host));
    }

    fn on_connect_result(&mut self, result: Result<NexusStream, StreamerError>) {
        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                metrics::record_connect("error");
                warn!(
                    target: "nexus.session",
                    session_id = self.config.session_id,
                    host = %self.host,
                    error = %e,
                    "Failed to connect to streaming host"
                );
                self.started = false;
                self.close_connection(SessionState::Disconnected);
                return;
            }
        };

        metrics::record_connect("success");
        debug!(
            target: "nexus.session",
            session_id = self.config.session_id,
            host = %self.host,
            "Connected, sending Hello"
        );

        let (reader, writer) = tokio::io::split(stream);
        let (writer, _writer_task) = ConnectionWriter::spawn(writer, self.config.session_id);
        self.connection = Some(Connection { reader, writer });
        self.frames.clear();
        self.read_buf.clear();
        self.authorized = false;
        self.state = SessionState::AwaitingAuth;

        let period = self.config.ping_interval;
        let mut ping = tokio::time::interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ping = Some(ping);

        let hello = self.hello();
        self.send(Packet::Hello(hello));
    }

    /// Drop the connection and everything scoped to it.
    ///
    /// Buffered frames are discarded, so nothing from this connection is
    /// dispatched afterwards.
    fn close_connection(&mut self, next_state: SessionState) {
        if self.connection.is_some() {
            debug!(
                target: "nexus.session",
                session_id = self.config.session_id,
                host = %self.host,
                discarded_bytes = self.frames.buffered_len(),
                discarded_pending = self.pending.len(),
                "Closing connection"
            );
        }

        self.connection = None;
        self.connecting = None;
        self.frames.clear();
        self.read_buf.clear();
        self.pending.clear();
        self.authorized = false;
        self.playback_confirmed = false;
        self.router.reset_channels();
        self.ping = None;
        self.playback_retry = None;
        self.state = next_state;
    }

    fn on_read(&mut self, result: std::io::Result<usize>) {
        match result {
            Ok(0) => {
                info!(
                    target: "nexus.session",
                    session_id = self.config.session_id,
                    host = %self.host,
                    "Streaming host closed the connection"
                );
                self.started = false;
                self.close_connection(SessionState::Disconnected);
            }
            Ok(_) => {
                self.frames.extend(&self.read_buf);
                self.read_buf.clear();
                self.drain_frames();
            }
            Err(e) => self.fail_connection(&StreamerError::from(e)),
        }
    }

    /// Dispatch every complete frame, in arrival order.
    fn drain_frames(&mut self) {
        loop {
            // A handler may have torn the connection down (redirect, error);
            // whatever is left belongs to the old connection.
            if self.connection.is_none() {
                self.frames.clear();
                return;
            }

            let frame = match self.frames.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return,
                Err(e) => {
                    self.fail_connection(&StreamerError::from(e));
                    return;
                }
            };

            match Packet::decode(frame) {
                Ok(packet) => self.on_packet(packet),
                Err(e) => {
                    self.fail_connection(&StreamerError::from(e));
                    return;
                }
            }
        }
    }

    /// Tear the connection down after a read-side failure.
    fn fail_connection(&mut self, error: &StreamerError) {
        if error.is_protocol_violation() {
            metrics::record_protocol_violation(error.label());
            warn!(
                target: "nexus.session",
                session_id = self.config.session_id,
                host = %self.host,
                error = %error,
                "Closing connection after protocol violation"
            );
        } else {
            warn!(
                target: "nexus.session",
                session_id = self.config.session_id,
                host = %self.host,
                error = %error,
                "Connection read failed"
            );
        }
        self.started = false;
        self.close_connection(SessionState::Disconnected);
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    fn authorize_request(&self) -> AuthorizeRequest {
        self.config.token_kind.authorize_request(&self.token.token())
    }

    fn hello(&self) -> Hello {
        Hello {
            protocol_version: Some(ProtocolVersion::Version3 as i32),
            uuid: self.config.camera_uuid.clone(),
            require_connected_camera: false,
            device_id: self.config.device_id.clone(),
            user_agent: self.config.identity.user_agent.clone(),
            client_type: self.config.identity.client_type as i32,
            authorize_request: Bytes::from(self.authorize_request().encode_to_vec()),
        }
    }

    /// Send a packet, or queue it until the connection is up and, for
    /// anything but the authorization packets, until the host sent `Ok`.
    fn send(&mut self, packet: Packet) {
        let bypasses_auth = matches!(packet, Packet::Hello(_) | Packet::AuthorizeRequest(_));
        let frame = packet.to_frame();

        if self.connection.is_none() || (!self.authorized && !bypasses_auth) {
            trace!(
                target: "nexus.session",
                session_id = self.config.session_id,
                packet_type = packet.name(),
                queued = self.pending.len() + 1,
                "Queueing packet"
            );
            self.pending.push_back(frame);
            return;
        }

        self.write_frame(frame);
    }

    /// Queue a frame on the live connection's writer. Frames are dropped
    /// when there is no connection or the host has stopped reading.
    fn write_frame(&mut self, frame: Frame) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };

        let name = PacketType::from_u8(frame.packet_type).map_or("unknown", PacketType::as_str);
        let bytes = match frame.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    target: "nexus.session",
                    session_id = self.config.session_id,
                    packet_type = name,
                    error = %e,
                    "Dropping unencodable frame"
                );
                return;
            }
        };

        match connection.writer.enqueue(bytes) {
            Enqueue::Queued => metrics::record_frame_sent(name),
            Enqueue::Full => {
                metrics::record_frame_dropped(name);
                warn!(
                    target: "nexus.session",
                    session_id = self.config.session_id,
                    host = %self.host,
                    packet_type = name,
                    "Host is not reading, dropping frame"
                );
            }
            Enqueue::Closed => {
                warn!(
                    target: "nexus.session",
                    session_id = self.config.session_id,
                    host = %self.host,
                    packet_type = name,
                    "Connection write failed"
                );
                self.started = false;
                self.close_connection(SessionState::Disconnected);
            }
        }
    }

    /// Write queued frames in the order they were sent.
    fn flush_pending(&mut self) {
        let queued = std::mem::take(&mut self.pending);
        if !queued.is_empty() {
            debug!(
                target: "nexus.session",
                session_id = self.config.session_id,
                count = queued.len(),
                "Flushing pending packets"
            );
        }

        for frame in queued {
            if self.connection.is_none() {
                break;
            }
            self.write_frame(frame);
        }
    }

    fn send_ping(&mut self) {
        // Pings are not worth queueing behind authorization.
        if self.authorized {
            self.write_frame(Packet::Ping.to_frame());
        }
    }

    fn send_talkback(&mut self, payload: Bytes) {
        if self.connection.is_none() && self.connecting.is_none() {
            trace!(
                target: "nexus.session",
                session_id = self.config.session_id,
                "Dropping return audio while disconnected"
            );
            return;
        }

        let audio = AudioPayload {
            payload,
            session_id: self.config.session_id,
            codec: TALKBACK_CODEC as i32,
            sample_rate: TALKBACK_SAMPLE_RATE,
            latency_measure_tag: 0,
        };
        self.send(Packet::AudioPayload(audio));
    }

    // ------------------------------------------------------------------
    // Playback control
    // ------------------------------------------------------------------

    fn start_playback(&mut self) {
        self.started = true;
        self.playback_confirmed = false;
        self.playback_retried = false;

        if self.connection.is_none() && self.connecting.is_none() {
            self.connect();
        }

        self.request_playback();
    }

    fn request_playback(&mut self) {
        let with_audio = self.config.audio_enabled && self.router.has_audio_sink();
        let request = self
            .config
            .quality
            .start_playback(self.config.session_id, with_audio);

        debug!(
            target: "nexus.session",
            session_id = self.config.session_id,
            quality = %self.config.quality,
            with_audio,
            "Requesting playback"
        );
        self.send(Packet::StartPlayback(request));
    }

    fn retry_playback(&mut self) {
        if self.started && self.connection.is_some() && !self.playback_confirmed {
            info!(
                target: "nexus.session",
                session_id = self.config.session_id,
                "Retrying playback request"
            );
            self.request_playback();
        }
    }

    /// Stop playback: best-effort `StopPlayback`, then close the connection.
    fn end_playback(&mut self, next_state: SessionState) {
        self.started = false;

        if self.authorized {
            let stop = StopPlayback {
                session_id: self.config.session_id,
            };
            self.write_frame(Packet::StopPlayback(stop).to_frame());
        }

        self.close_connection(next_state);
    }

    /// Explicit, terminal stop.
    fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }

        info!(
            target: "nexus.session",
            session_id = self.config.session_id,
            host = %self.host,
            "Stopping playback"
        );
        self.end_playback(SessionState::Stopped);
        self.talkback_cancel.cancel();
        self.router.close();
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    fn on_packet(&mut self, packet: Packet) {
        metrics::record_frame_received(packet.name());

        match packet {
            Packet::Ok => self.on_ok(),
            Packet::Error(error) => self.on_error(&error),
            Packet::PlaybackBegin(begin) => self.on_playback_begin(&begin),
            Packet::PlaybackPacket(media) => self.on_playback_packet(&media),
            Packet::PlaybackEnd(end) => self.on_playback_end(&end),
            Packet::Redirect(redirect) => self.on_redirect(redirect),
            Packet::Ping => {}
            other => {
                debug!(
                    target: "nexus.session",
                    session_id = self.config.session_id,
                    packet_type = other.name(),
                    "Ignoring packet"
                );
            }
        }
    }

    fn on_ok(&mut self) {
        if !self.authorized {
            info!(
                target: "nexus.session",
                session_id = self.config.session_id,
                host = %self.host,
                "Authorized by streaming host"
            );
        }
        self.authorized = true;
        if self.state == SessionState::AwaitingAuth {
            self.state = SessionState::Authorized;
        }
        self.flush_pending();
    }

    fn on_error(&mut self, error: &ErrorPacket) {
        if error.is_authorization_failure() {
            self.reauthorizations += 1;
            metrics::record_reauthorization();
            info!(
                target: "nexus.session",
                session_id = self.config.session_id,
                reauthorizations = self.reauthorizations,
                "Authorization rejected, re-sending credentials"
            );
            let request = self.authorize_request();
            self.send(Packet::AuthorizeRequest(request));
            return;
        }

        warn!(
            target: "nexus.session",
            session_id = self.config.session_id,
            host = %self.host,
            code = error.code,
            message = %error.message,
            "Streaming host reported an error, stopping playback"
        );
        self.end_playback(SessionState::Disconnected);
    }

    fn on_playback_begin(&mut self, begin: &PlaybackBegin) {
        if begin.session_id != self.config.session_id {
            debug!(
                target: "nexus.session",
                session_id = self.config.session_id,
                received_session_id = begin.session_id,
                "Ignoring PlaybackBegin for another session"
            );
            return;
        }

        self.router.reset_channels();
        for channel in &begin.channels {
            match CodecType::try_from(channel.codec_type) {
                Ok(CodecType::H264) => self.router.set_video_channel(channel.channel_id),
                Ok(CodecType::Aac | CodecType::Opus) => {
                    self.router.set_audio_channel(channel.channel_id);
                }
                _ => {
                    debug!(
                        target: "nexus.session",
                        session_id = self.config.session_id,
                        channel_id = channel.channel_id,
                        codec_type = channel.codec_type,
                        "Ignoring channel"
                    );
                }
            }
        }

        self.playback_confirmed = true;
        self.playback_retry = None;
        self.state = SessionState::Streaming;

        info!(
            target: "nexus.session",
            session_id = self.config.session_id,
            video_channel = ?self.router.video_channel(),
            audio_channel = ?self.router.audio_channel(),
            "Playback started"
        );
    }

    fn on_playback_packet(&self, media: &PlaybackPacket) {
        if self.router.route(media.channel_id, &media.payload).is_none() {
            trace!(
                target: "nexus.session",
                session_id = self.config.session_id,
                channel_id = media.channel_id,
                "Dropping payload for undeclared channel"
            );
        }
    }

    fn on_playback_end(&mut self, end: &PlaybackEnd) {
        let reason = PlaybackEndReason::try_from(end.reason).ok();

        if reason == Some(PlaybackEndReason::ErrorTimeNotAvailable)
            && !self.playback_confirmed
            && !self.playback_retried
        {
            self.playback_retried = true;
            self.playback_retry = Some(Box::pin(tokio::time::sleep(
                self.config.playback_retry_delay,
            )));
            info!(
                target: "nexus.session",
                session_id = self.config.session_id,
                delay_ms = self.config.playback_retry_delay.as_millis(),
                "Playback time not available yet, scheduling retry"
            );
            return;
        }

        info!(
            target: "nexus.session",
            session_id = self.config.session_id,
            reason = end.reason,
            "Playback ended by streaming host"
        );
        self.started = false;
        self.playback_confirmed = false;
        self.playback_retry = None;
        self.router.reset_channels();
        if self.authorized {
            self.state = SessionState::Authorized;
        }
    }

    fn on_redirect(&mut self, redirect: Redirect) {
        if redirect.new_host.is_empty() {
            warn!(
                target: "nexus.session",
                session_id = self.config.session_id,
                "Ignoring redirect without a host"
            );
            return;
        }

        self.redirects += 1;
        metrics::record_redirect();
        info!(
            target: "nexus.session",
            session_id = self.config.session_id,
            from = %self.host,
            to = %redirect.new_host,
            redirects = self.redirects,
            "Redirected to new streaming host"
        );

        let resume = self.started;
        self.close_connection(SessionState::Disconnected);
        self.host = redirect.new_host;
        self.connect();

        if resume {
            self.start_playback();
        }
    }
}
