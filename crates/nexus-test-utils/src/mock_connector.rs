//! Mock connector.
//!
//! Every `connect` call is surfaced to the test as a [`PendingConnection`],
//! which the test accepts (yielding a [`MockNexusHost`]) or refuses.

use crate::mock_host::MockNexusHost;
use nexus_streamer::transport::{ConnectFuture, Connector, NexusStream};
use nexus_streamer::StreamerError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// In-memory pipe capacity per connection.
const DUPLEX_CAPACITY: usize = 1 << 20;

/// How long `ConnectionRequests::next` waits by default.
pub const DEFAULT_CONNECT_WAIT: Duration = Duration::from_secs(5);

/// `Connector` whose connection attempts are resolved by the test.
#[derive(Debug)]
pub struct MockConnector {
    requests: mpsc::UnboundedSender<PendingConnection>,
    hosts: Mutex<Vec<String>>,
}

impl MockConnector {
    /// Create a connector and the stream of its connection attempts.
    #[must_use]
    pub fn new() -> (Arc<Self>, ConnectionRequests) {
        let (requests, receiver) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            requests,
            hosts: Mutex::new(Vec::new()),
        });
        (connector, ConnectionRequests { receiver })
    }

    /// Hosts connected to so far, in order.
    #[must_use]
    pub fn hosts(&self) -> Vec<String> {
        self.hosts.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    fn connect(&self, host: &str) -> ConnectFuture {
        self.hosts.lock().unwrap().push(host.to_string());

        let (respond_to, response) = oneshot::channel();
        let _ = self.requests.send(PendingConnection {
            host: host.to_string(),
            respond_to,
        });

        let host = host.to_string();
        Box::pin(async move {
            response.await.unwrap_or_else(|_| {
                Err(StreamerError::Connect {
                    host,
                    source: std::io::Error::new(
                        std::io::ErrorKind::ConnectionAborted,
                        "test dropped the connection attempt",
                    ),
                })
            })
        })
    }
}

/// Connection attempts made through a [`MockConnector`].
#[derive(Debug)]
pub struct ConnectionRequests {
    receiver: mpsc::UnboundedReceiver<PendingConnection>,
}

impl ConnectionRequests {
    /// Wait for the next connection attempt.
    ///
    /// # Panics
    ///
    /// Panics if none arrives within [`DEFAULT_CONNECT_WAIT`].
    pub async fn next(&mut self) -> PendingConnection {
        tokio::time::timeout(DEFAULT_CONNECT_WAIT, self.receiver.recv())
            .await
            .expect("timed out waiting for a connection attempt")
            .expect("connector dropped")
    }

    /// Assert that no connection attempt arrives within `wait`.
    pub async fn assert_none(&mut self, wait: Duration) {
        if let Ok(Some(pending)) = tokio::time::timeout(wait, self.receiver.recv()).await {
            panic!("unexpected connection attempt to {}", pending.host);
        }
    }
}

/// A connection attempt waiting for the test's decision.
pub struct PendingConnection {
    host: String,
    respond_to: oneshot::Sender<Result<NexusStream, StreamerError>>,
}

impl std::fmt::Debug for PendingConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingConnection")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl PendingConnection {
    /// Host the session is connecting to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Complete the connection and return the host side of it.
    #[must_use]
    pub fn accept(self) -> MockNexusHost {
        self.accept_with_capacity(DUPLEX_CAPACITY)
    }

    /// Complete the connection over a pipe holding at most `capacity`
    /// unread bytes in each direction.
    ///
    /// A small capacity lets a test stand in for a host that stops reading.
    #[must_use]
    pub fn accept_with_capacity(self, capacity: usize) -> MockNexusHost {
        let (client, server) = tokio::io::duplex(capacity);
        let stream: NexusStream = Box::new(client);
        let _ = self.respond_to.send(Ok(stream));
        MockNexusHost::new(self.host, server)
    }

    /// Fail the connection attempt.
    pub fn refuse(self) {
        let _ = self.respond_to.send(Err(StreamerError::Connect {
            host: self.host,
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        }));
    }
}
