//! Connections to the streaming host.
//!
//! Sessions open connections through the [`Connector`] trait so tests can
//! substitute in-memory streams for the TLS socket.

use crate::errors::StreamerError;
use rustls::pki_types::ServerName;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// Port the streaming host listens on.
pub const NEXUS_PORT: u16 = 1443;

/// Byte stream a session reads frames from and writes frames to.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// Boxed connection handed to a session.
pub type NexusStream = Box<dyn AsyncStream>;

/// Future resolving to an established connection.
pub type ConnectFuture = Pin<Box<dyn Future<Output = Result<NexusStream, StreamerError>> + Send>>;

/// Opens connections to streaming hosts.
pub trait Connector: Send + Sync + 'static {
    /// Start connecting to `host`. The returned future owns everything it
    /// needs so a session can poll it alongside other work.
    fn connect(&self, host: &str) -> ConnectFuture;
}

/// TLS connector trusting the webpki root set.
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
    port: u16,
}

impl TlsConnector {
    /// Build a connector for [`NEXUS_PORT`].
    ///
    /// # Errors
    ///
    /// Returns `StreamerError::Tls` if the TLS configuration is rejected.
    pub fn new() -> Result<Self, StreamerError> {
        Self::with_port(NEXUS_PORT)
    }

    /// Build a connector for a non-default port.
    ///
    /// # Errors
    ///
    /// Returns `StreamerError::Tls` if the TLS configuration is rejected.
    pub fn with_port(port: u16) -> Result<Self, StreamerError> {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| StreamerError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Self {
            inner: tokio_rustls::TlsConnector::from(Arc::new(config)),
            port,
        })
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl Connector for TlsConnector {
    fn connect(&self, host: &str) -> ConnectFuture {
        let connector = self.inner.clone();
        let port = self.port;
        let host = host.to_string();

        Box::pin(async move {
            let server_name = ServerName::try_from(host.clone())
                .map_err(|_| StreamerError::InvalidServerName(host.clone()))?;

            let tcp = TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|source| StreamerError::Connect {
                    host: host.clone(),
                    source,
                })?;
            tcp.set_nodelay(true)?;

            let tls = connector
                .connect(server_name, tcp)
                .await
                .map_err(|source| StreamerError::Connect {
                    host: host.clone(),
                    source,
                })?;

            debug!(target: "nexus.transport", host = %host, port, "TLS connection established");
            Ok(Box::new(tls) as NexusStream)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_connector_builds() {
        let connector = TlsConnector::new().unwrap();
        assert!(format!("{connector:?}").contains("1443"));
    }

    #[tokio::test]
    async fn test_invalid_server_name() {
        let connector = TlsConnector::new().unwrap();
        let result = connector.connect("not a host name").await;
        assert!(matches!(result, Err(StreamerError::InvalidServerName(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_reports_host() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = TlsConnector::with_port(port).unwrap();
        let result = connector.connect("localhost").await;
        assert!(matches!(
            result,
            Err(StreamerError::Connect { ref host, .. }) if host == "localhost"
        ));
    }
}
