//! Session actor tests against a scripted streaming host.
//!
//! Covers the connection and authorization handshake, outbound gating,
//! channel routing, redirects, host errors and shutdown.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use bytes::Bytes;
use common::secret::SecretString;
use nexus_protocol::messages::{
    AuthorizeRequest, ClientType, CodecType, ErrorCode, PlaybackPacket, Redirect, StreamProfile,
};
use nexus_protocol::Packet;
use nexus_streamer::identity::ClientIdentity;
use nexus_streamer::{SessionState, StreamSessionHandle, StreamerError};
use nexus_test_utils::*;
use prost::Message;

/// Short wait used when asserting that nothing happens.
const QUIET: Duration = Duration::from_millis(100);

async fn wait_for_state(handle: &StreamSessionHandle, state: SessionState) {
    let poll = async {
        loop {
            if handle.status().await.unwrap().state == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .unwrap_or_else(|_| panic!("session never reached {state:?}"));
}

/// Start playback and complete the handshake on the first connection.
async fn authorized(
    handle: &StreamSessionHandle,
    connections: &mut ConnectionRequests,
) -> MockNexusHost {
    handle.start_playback().await.unwrap();
    let mut host = connections.next().await.accept();
    host.expect_hello().await;
    host.send_ok().await;
    let request = host.expect_start_playback().await;
    assert_eq!(request.session_id, TEST_SESSION_ID);
    host
}

/// Authorize, then declare H.264 on channel 5 and AAC on channel 7.
async fn streaming(
    handle: &StreamSessionHandle,
    connections: &mut ConnectionRequests,
) -> MockNexusHost {
    let mut host = authorized(handle, connections).await;
    host.send_playback_begin(TEST_SESSION_ID, &[(5, CodecType::H264), (7, CodecType::Aac)])
        .await;
    wait_for_state(handle, SessionState::Streaming).await;
    host
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_hello_carries_identity_and_token() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let sinks = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector.clone(), token, sinks.sinks);

    handle.start_playback().await.unwrap();
    let pending = connections.next().await;
    assert_eq!(pending.host(), "host-a");
    let mut host = pending.accept();

    let hello = host.expect_hello().await;
    assert_eq!(hello.protocol_version, Some(3));
    assert_eq!(hello.uuid, TEST_CAMERA_UUID);
    assert_eq!(hello.device_id, "nexus-streamer");
    assert_eq!(hello.user_agent, ClientIdentity::default().user_agent);
    assert_eq!(hello.client_type, ClientType::Ios as i32);

    let auth = AuthorizeRequest::decode(hello.authorize_request).unwrap();
    assert_eq!(auth.olive_token, TEST_ACCESS_TOKEN);
    assert!(auth.session_token.is_empty());

    assert_eq!(connector.hosts(), vec!["host-a".to_string()]);
}

#[tokio::test]
async fn test_playback_request_waits_for_authorization() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let sinks = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks.sinks);

    handle.start_playback().await.unwrap();
    let mut host = connections.next().await.accept();
    host.expect_hello().await;

    // Only Hello goes out before the host accepts the credentials.
    host.assert_no_packet(QUIET).await;
    let status = handle.status().await.unwrap();
    assert_eq!(status.state, SessionState::AwaitingAuth);
    assert!(!status.authorized);
    assert_eq!(status.pending_messages, 1);

    host.send_ok().await;
    let request = host.expect_start_playback().await;
    assert_eq!(request.session_id, TEST_SESSION_ID);
    assert!(request
        .other_profiles
        .contains(&(StreamProfile::AudioAac as i32)));

    let status = handle.status().await.unwrap();
    assert_eq!(status.state, SessionState::Authorized);
    assert!(status.authorized);
    assert_eq!(status.pending_messages, 0);
}

#[tokio::test]
async fn test_queued_requests_flush_in_order() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let sinks = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks.sinks);

    handle.start_playback().await.unwrap();
    handle.start_playback().await.unwrap();
    let mut host = connections.next().await.accept();
    host.expect_hello().await;
    host.send_ok().await;

    host.expect_start_playback().await;
    host.expect_start_playback().await;
    host.assert_no_packet(QUIET).await;

    // Still a single connection.
    connections.assert_none(QUIET).await;
}

#[tokio::test]
async fn test_connect_refused_leaves_session_disconnected() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let sinks = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks.sinks);

    handle.start_playback().await.unwrap();
    connections.next().await.refuse();

    wait_for_state(&handle, SessionState::Disconnected).await;
    let status = handle.status().await.unwrap();
    assert_eq!(status.pending_messages, 0);
    assert!(!status.started);
    connections.assert_none(QUIET).await;
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_payloads_routed_by_declared_channel() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let TestSinks { sinks, mut video, mut audio } = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks);

    let mut host = streaming(&handle, &mut connections).await;
    let status = handle.status().await.unwrap();
    assert_eq!(status.video_channel, Some(5));
    assert_eq!(status.audio_channel, Some(7));

    host.send_playback_packet(TEST_SESSION_ID, 5, &[0x65, 0x88]).await;
    host.send_playback_packet(TEST_SESSION_ID, 7, &[0x21, 0x10]).await;
    host.send_playback_packet(TEST_SESSION_ID, 9, &[0xff]).await;
    host.send_long_playback_packet(TEST_SESSION_ID, 5, &[0x41]).await;

    assert_eq!(next_chunk(&mut video).await, Bytes::from_static(&[0, 0, 0, 1, 0x65, 0x88]));
    assert_eq!(next_chunk(&mut audio).await, Bytes::from_static(&[0x21, 0x10]));
    assert_eq!(next_chunk(&mut video).await, Bytes::from_static(&[0, 0, 0, 1, 0x41]));

    // Channel 9 was never declared.
    assert!(video.try_recv().is_err());
    assert!(audio.try_recv().is_err());
}

#[tokio::test]
async fn test_playback_begin_for_other_session_is_ignored() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let TestSinks { sinks, mut video, .. } = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks);

    let mut host = authorized(&handle, &mut connections).await;
    host.send_playback_begin(TEST_SESSION_ID + 1, &[(5, CodecType::H264)])
        .await;
    host.send_playback_packet(TEST_SESSION_ID, 5, &[0xaa]).await;

    host.send_playback_begin(TEST_SESSION_ID, &[(5, CodecType::H264)])
        .await;
    host.send_playback_packet(TEST_SESSION_ID, 5, &[0xbb]).await;

    // The first payload arrived before channel 5 was declared for this session.
    assert_eq!(next_chunk(&mut video).await, Bytes::from_static(&[0, 0, 0, 1, 0xbb]));
}

// ============================================================================
// Redirect
// ============================================================================

#[tokio::test]
async fn test_redirect_reconnects_and_resumes_playback() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let TestSinks { sinks, mut video, .. } = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector.clone(), token, sinks);

    let mut host_a = streaming(&handle, &mut connections).await;
    host_a.send_redirect("host-b").await;

    let pending = connections.next().await;
    assert_eq!(pending.host(), "host-b");
    let mut host_b = pending.accept();

    // Nothing else is said on the old connection.
    assert!(host_a.expect_closed().await.is_empty());

    host_b.expect_hello().await;
    host_b.send_ok().await;
    host_b.expect_start_playback().await;

    let status = handle.status().await.unwrap();
    assert_eq!(status.host, "host-b");
    assert_eq!(status.redirects, 1);
    assert_eq!(status.video_channel, None);

    // Channel ids from host-a no longer route.
    host_b.send_playback_packet(TEST_SESSION_ID, 5, &[0xaa]).await;
    host_b
        .send_playback_begin(TEST_SESSION_ID, &[(6, CodecType::H264)])
        .await;
    host_b.send_playback_packet(TEST_SESSION_ID, 6, &[0xbb]).await;
    assert_eq!(next_chunk(&mut video).await, Bytes::from_static(&[0, 0, 0, 1, 0xbb]));

    assert_eq!(connector.hosts(), vec!["host-a".to_string(), "host-b".to_string()]);
}

#[tokio::test]
async fn test_payload_after_redirect_in_same_read_is_discarded() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let TestSinks { sinks, mut video, .. } = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks);

    let mut host_a = streaming(&handle, &mut connections).await;

    let redirect = Packet::Redirect(Redirect {
        new_host: "host-b".to_string(),
        is_transcode: false,
    });
    let payload = Packet::PlaybackPacket(PlaybackPacket {
        session_id: TEST_SESSION_ID,
        channel_id: 5,
        payload: Bytes::from_static(&[0xaa]),
        ..PlaybackPacket::default()
    });
    let mut bytes = redirect.to_frame().to_bytes().unwrap().to_vec();
    bytes.extend_from_slice(&payload.to_frame().to_bytes().unwrap());
    host_a.send_raw(&bytes).await;

    let pending = connections.next().await;
    assert_eq!(pending.host(), "host-b");
    let mut host_b = pending.accept();
    host_b.expect_hello().await;
    host_b.send_ok().await;
    host_b.expect_start_playback().await;

    // The payload belonged to host-a's channel table.
    assert!(tokio::time::timeout(QUIET, video.recv()).await.is_err());
    assert_eq!(handle.status().await.unwrap().redirects, 1);
}

#[tokio::test]
async fn test_redirect_without_host_is_ignored() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let sinks = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks.sinks);

    let mut host = streaming(&handle, &mut connections).await;
    host.send_redirect("").await;

    connections.assert_none(QUIET).await;
    let status = handle.status().await.unwrap();
    assert_eq!(status.state, SessionState::Streaming);
    assert_eq!(status.redirects, 0);
}

// ============================================================================
// Host errors
// ============================================================================

#[tokio::test]
async fn test_authorization_failure_reauthorizes_in_place() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let sinks = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks.sinks);

    let mut host = streaming(&handle, &mut connections).await;
    host.send_error(ErrorCode::AuthorizationFailed, "token expired")
        .await;

    match host.recv_packet().await {
        Packet::AuthorizeRequest(request) => assert_eq!(request.olive_token, TEST_ACCESS_TOKEN),
        other => panic!("expected AuthorizeRequest, got {other:?}"),
    }
    host.assert_no_packet(QUIET).await;
    connections.assert_none(QUIET).await;

    let status = handle.status().await.unwrap();
    assert_eq!(status.reauthorizations, 1);
    assert_eq!(status.state, SessionState::Streaming);
    assert_eq!(status.video_channel, Some(5));
}

#[tokio::test]
async fn test_reauthorization_uses_refreshed_token() {
    let (connector, mut connections) = MockConnector::new();
    let (publisher, token) = test_token();
    let sinks = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks.sinks);

    let mut host = authorized(&handle, &mut connections).await;
    publisher
        .publish(SecretString::from("refreshed-token"))
        .unwrap();
    host.send_error(ErrorCode::AuthorizationFailed, "").await;

    match host.recv_packet().await {
        Packet::AuthorizeRequest(request) => assert_eq!(request.olive_token, "refreshed-token"),
        other => panic!("expected AuthorizeRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn test_host_error_stops_playback_and_closes() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let sinks = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks.sinks);

    let mut host = streaming(&handle, &mut connections).await;
    host.send_error(ErrorCode::CameraNotConnected, "camera offline")
        .await;

    let packets = host.expect_closed().await;
    assert!(
        matches!(packets.as_slice(), [Packet::StopPlayback(stop)] if stop.session_id == TEST_SESSION_ID),
        "expected a single StopPlayback, got {packets:?}"
    );

    let status = handle.status().await.unwrap();
    assert_eq!(status.state, SessionState::Disconnected);
    assert!(!status.started);
    assert!(!status.authorized);
    connections.assert_none(QUIET).await;
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let sinks = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks.sinks);

    let mut host = authorized(&handle, &mut connections).await;
    // Long playback packet declaring a 256 MiB body.
    host.send_raw(&[205, 0x10, 0x00, 0x00, 0x00]).await;

    assert!(host.expect_closed().await.is_empty());
    wait_for_state(&handle, SessionState::Disconnected).await;
}

#[tokio::test]
async fn test_host_disconnect_leaves_session_disconnected() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let sinks = TestSinks::new();
    let (handle, _task) = spawn_session(test_session_config("host-a"), connector, token, sinks.sinks);

    let host = streaming(&handle, &mut connections).await;
    drop(host);

    wait_for_state(&handle, SessionState::Disconnected).await;
    let status = handle.status().await.unwrap();
    assert!(!status.started);
    assert_eq!(status.video_channel, None);
    connections.assert_none(QUIET).await;
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_stop_playback_closes_connection_and_sinks() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let TestSinks { sinks, mut video, mut audio } = TestSinks::new();
    let (handle, task) = spawn_session(test_session_config("host-a"), connector, token, sinks);

    let mut host = streaming(&handle, &mut connections).await;
    handle.stop_playback().await.unwrap();

    let packets = host.expect_closed().await;
    assert!(
        matches!(packets.as_slice(), [Packet::StopPlayback(_)]),
        "expected a single StopPlayback, got {packets:?}"
    );

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("session did not exit")
        .unwrap();
    assert!(video.recv().await.is_none());
    assert!(audio.recv().await.is_none());

    assert!(matches!(
        handle.status().await,
        Err(StreamerError::ChannelClosed)
    ));
}

#[tokio::test]
async fn test_cancel_ends_session() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let TestSinks { sinks, mut video, .. } = TestSinks::new();
    let (handle, task) = spawn_session(test_session_config("host-a"), connector, token, sinks);

    let mut host = streaming(&handle, &mut connections).await;
    handle.cancel();
    assert!(handle.is_cancelled());

    host.expect_closed().await;
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("session did not exit")
        .unwrap();
    assert!(video.recv().await.is_none());
}

/// Capacity small enough that the session's Hello cannot be written.
const STALLED_PIPE_CAPACITY: usize = 8;

/// Budget for operations that must not wait on a host that stopped reading.
const STALL_BUDGET: Duration = Duration::from_secs(3);

#[tokio::test]
async fn test_stop_returns_while_host_is_not_reading() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let TestSinks { sinks, mut video, .. } = TestSinks::new();
    let (handle, task) = spawn_session(test_session_config("host-a"), connector, token, sinks);

    handle.start_playback().await.unwrap();
    let mut host = connections.next().await.accept_with_capacity(STALLED_PIPE_CAPACITY);
    // Authorize without ever reading, so StartPlayback queues behind Hello.
    host.send_ok().await;
    wait_for_state(&handle, SessionState::Authorized).await;

    tokio::time::timeout(STALL_BUDGET, handle.status())
        .await
        .expect("status blocked on a stalled host")
        .unwrap();
    tokio::time::timeout(STALL_BUDGET, handle.stop_playback())
        .await
        .expect("stop_playback blocked on a stalled host")
        .unwrap();
    tokio::time::timeout(STALL_BUDGET, task)
        .await
        .expect("session did not exit")
        .unwrap();
    assert!(video.recv().await.is_none());
}

#[tokio::test]
async fn test_cancel_returns_while_host_is_not_reading() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let sinks = TestSinks::new();
    let (handle, task) = spawn_session(test_session_config("host-a"), connector, token, sinks.sinks);

    handle.start_playback().await.unwrap();
    let mut host = connections.next().await.accept_with_capacity(STALLED_PIPE_CAPACITY);
    host.send_ok().await;
    wait_for_state(&handle, SessionState::Authorized).await;

    handle.cancel();
    tokio::time::timeout(STALL_BUDGET, task)
        .await
        .expect("session did not exit")
        .unwrap();
}

#[tokio::test]
async fn test_stop_before_connecting() {
    let (connector, mut connections) = MockConnector::new();
    let (_publisher, token) = test_token();
    let TestSinks { sinks, mut video, .. } = TestSinks::new();
    let (handle, task) = spawn_session(test_session_config("host-a"), connector, token, sinks);

    handle.stop_playback().await.unwrap();
    task.await.unwrap();

    assert!(video.recv().await.is_none());
    connections.assert_none(QUIET).await;
}
