//! Connection writer task.
//!
//! The session never awaits a socket write. Encoded frames go through a
//! bounded queue to a task that owns the write half, so a host that stops
//! reading stalls only this task.

use crate::transport::NexusStream;
use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Encoded frames waiting for the socket.
pub(crate) const WRITE_QUEUE_CAPACITY: usize = 256;

/// How long queued frames may take to flush after the connection is closed.
pub(crate) const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of queueing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enqueue {
    Queued,
    /// The host is not reading fast enough; the frame was dropped.
    Full,
    /// The writer task ended after a write failure.
    Closed,
}

/// Sending side of a connection's writer task.
///
/// Dropping it closes the queue: the task flushes what is left, then shuts
/// the write half down, giving up after [`WRITER_DRAIN_TIMEOUT`].
#[derive(Debug)]
pub(crate) struct ConnectionWriter {
    sender: mpsc::Sender<Bytes>,
    closed: CancellationToken,
}

impl ConnectionWriter {
    /// Spawn the writer task for `writer`.
    pub(crate) fn spawn(writer: WriteHalf<NexusStream>, session_id: u32) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let closed = CancellationToken::new();
        let task = tokio::spawn(run(writer, receiver, closed.clone(), session_id));
        (Self { sender, closed }, task)
    }

    /// Queue encoded bytes without waiting.
    pub(crate) fn enqueue(&self, bytes: Bytes) -> Enqueue {
        match self.sender.try_send(bytes) {
            Ok(()) => Enqueue::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Enqueue::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }
}

impl Drop for ConnectionWriter {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

async fn run(
    mut writer: WriteHalf<NexusStream>,
    mut receiver: mpsc::Receiver<Bytes>,
    closed: CancellationToken,
    session_id: u32,
) {
    let write = async {
        while let Some(bytes) = receiver.recv().await {
            writer.write_all(&bytes).await?;
            writer.flush().await?;
        }
        writer.shutdown().await
    };

    let drain_deadline = async {
        closed.cancelled().await;
        tokio::time::sleep(WRITER_DRAIN_TIMEOUT).await;
    };

    tokio::select! {
        result = write => {
            if let Err(e) = result {
                debug!(
                    target: "nexus.session",
                    session_id,
                    error = %e,
                    "Connection write failed"
                );
            }
        }
        () = drain_deadline => {
            debug!(
                target: "nexus.session",
                session_id,
                "Host stopped reading, abandoning queued frames"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn split(capacity: usize) -> (WriteHalf<NexusStream>, tokio::io::DuplexStream) {
        let (client, server) = tokio::io::duplex(capacity);
        let stream: NexusStream = Box::new(client);
        let (_reader, writer) = tokio::io::split(stream);
        (writer, server)
    }

    #[tokio::test]
    async fn test_frames_written_in_order_then_shutdown() {
        let (writer, mut server) = split(1024);
        let (queue, task) = ConnectionWriter::spawn(writer, 1);

        assert_eq!(queue.enqueue(Bytes::from_static(b"abc")), Enqueue::Queued);
        assert_eq!(queue.enqueue(Bytes::from_static(b"def")), Enqueue::Queued);
        drop(queue);
        task.await.unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"abcdef");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_host_is_abandoned_after_drain_timeout() {
        let (writer, _server) = split(4);
        let (queue, task) = ConnectionWriter::spawn(writer, 1);

        assert_eq!(queue.enqueue(Bytes::from(vec![0u8; 64])), Enqueue::Queued);
        drop(queue);

        tokio::time::timeout(WRITER_DRAIN_TIMEOUT * 2, task)
            .await
            .expect("writer task did not give up")
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_waiting() {
        let (writer, _server) = split(1);
        let (queue, _task) = ConnectionWriter::spawn(writer, 1);

        let outcomes: Vec<Enqueue> = (0..WRITE_QUEUE_CAPACITY + 8)
            .map(|_| queue.enqueue(Bytes::from_static(b"frame")))
            .collect();
        assert!(outcomes.contains(&Enqueue::Full));
    }

    #[tokio::test]
    async fn test_write_failure_closes_queue() {
        let (writer, server) = split(64);
        let (queue, task) = ConnectionWriter::spawn(writer, 1);
        drop(server);

        assert_eq!(queue.enqueue(Bytes::from_static(b"lost")), Enqueue::Queued);
        task.await.unwrap();
        assert_eq!(queue.enqueue(Bytes::from_static(b"late")), Enqueue::Closed);
    }
}
