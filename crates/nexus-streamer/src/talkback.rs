//! Return audio forwarding.
//!
//! Reads chunks from the talkback source and hands them to the session,
//! which wraps each one in an `AudioPayload`. Audio arrives in bursts, and
//! the host expects an explicit terminator: once no chunk has arrived for
//! the debounce window, a single empty payload is sent.

use crate::session::messages::SessionMessage;
use crate::sink::TalkbackSource;
use bytes::{Bytes, BytesMut};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Silence after which end of speech is signalled.
pub const TALKBACK_DEBOUNCE: Duration = Duration::from_secs(1);

/// Largest chunk read from the source at once.
const TALKBACK_READ_CHUNK: usize = 4096;

/// Spawn the forwarder. It holds only a weak sender so it never keeps the
/// session mailbox open on its own.
pub(crate) fn spawn(
    source: TalkbackSource,
    sender: mpsc::WeakSender<SessionMessage>,
    cancel_token: CancellationToken,
    debounce: Duration,
) -> JoinHandle<()> {
    tokio::spawn(run(source, sender, cancel_token, debounce))
}

async fn wait_for(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn forward(sender: &mpsc::WeakSender<SessionMessage>, payload: Bytes) -> bool {
    match sender.upgrade() {
        Some(sender) => sender
            .send(SessionMessage::Talkback { payload })
            .await
            .is_ok(),
        None => false,
    }
}

async fn run(
    mut source: TalkbackSource,
    sender: mpsc::WeakSender<SessionMessage>,
    cancel_token: CancellationToken,
    debounce: Duration,
) {
    let mut buf = BytesMut::with_capacity(TALKBACK_READ_CHUNK);
    let mut end_of_speech: Option<Pin<Box<Sleep>>> = None;
    let mut exhausted = false;

    debug!(target: "nexus.talkback", "Talkback forwarder started");

    loop {
        buf.reserve(TALKBACK_READ_CHUNK);

        tokio::select! {
            () = cancel_token.cancelled() => break,

            () = wait_for(&mut end_of_speech) => {
                end_of_speech = None;
                debug!(target: "nexus.talkback", "End of speech");
                if !forward(&sender, Bytes::new()).await {
                    break;
                }
            }

            result = source.read_buf(&mut buf), if !exhausted => {
                match result {
                    Ok(0) => {
                        debug!(target: "nexus.talkback", "Talkback source ended");
                        exhausted = true;
                    }
                    Ok(_) => {
                        let payload = buf.split().freeze();
                        if !forward(&sender, payload).await {
                            break;
                        }
                        let deadline = Instant::now() + debounce;
                        match end_of_speech.as_mut() {
                            Some(sleep) => sleep.as_mut().reset(deadline),
                            None => end_of_speech = Some(Box::pin(tokio::time::sleep_until(deadline))),
                        }
                    }
                    Err(e) => {
                        warn!(target: "nexus.talkback", error = %e, "Talkback source failed");
                        exhausted = true;
                    }
                }
            }
        }

        // Finish once the source is drained and any terminator has been sent.
        if exhausted && end_of_speech.is_none() {
            break;
        }
    }

    debug!(target: "nexus.talkback", "Talkback forwarder stopped");
}
