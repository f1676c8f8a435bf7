//! Access-token channel between the credential provider and streaming sessions.
//!
//! Whatever mints camera access tokens (login flow, refresh timer) owns the
//! [`TokenPublisher`]; each streaming session holds a [`TokenReceiver`] and
//! reads the latest token whenever it has to build an authorization payload.
//!
//! - Thread-safe access via `tokio::sync::watch`
//! - Readers never block the publisher
//! - Token values are never logged
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//! use common::token::token_channel;
//!
//! let (publisher, receiver) = token_channel(SecretString::from("first"));
//! publisher.publish(SecretString::from("refreshed")).unwrap();
//!
//! assert_eq!(receiver.token().expose_secret(), "refreshed");
//! ```

use crate::secret::SecretString;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

/// Errors from the token channel.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    /// All receivers (or the publisher) have been dropped.
    #[error("Token channel closed")]
    ChannelClosed,
}

/// Create a token channel seeded with an initial token.
#[must_use]
pub fn token_channel(initial: SecretString) -> (TokenPublisher, TokenReceiver) {
    let (sender, receiver) = watch::channel(initial);
    (TokenPublisher(sender), TokenReceiver(receiver))
}

/// Publishing side of the token channel.
pub struct TokenPublisher(watch::Sender<SecretString>);

impl TokenPublisher {
    /// Replace the current token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::ChannelClosed` if every receiver is gone.
    pub fn publish(&self, token: SecretString) -> Result<(), TokenError> {
        self.0.send(token).map_err(|_| TokenError::ChannelClosed)?;
        debug!(target: "nexus.token", "Access token updated");
        Ok(())
    }

    /// Create another receiver for a new session.
    #[must_use]
    pub fn subscribe(&self) -> TokenReceiver {
        TokenReceiver(self.0.subscribe())
    }
}

impl std::fmt::Debug for TokenPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPublisher")
            .field("receivers", &self.0.receiver_count())
            .finish()
    }
}

/// Wrapper around watch receiver that provides safe token access.
///
/// This wrapper ensures that callers don't hold the borrow lock longer than
/// necessary, which would block the publisher from updating the token.
#[derive(Clone)]
pub struct TokenReceiver(watch::Receiver<SecretString>);

impl TokenReceiver {
    /// Create a `TokenReceiver` from a watch receiver.
    #[must_use]
    pub fn from_watch_receiver(receiver: watch::Receiver<SecretString>) -> Self {
        Self(receiver)
    }

    /// A receiver whose token never changes.
    #[must_use]
    pub fn fixed(token: SecretString) -> Self {
        let (_sender, receiver) = watch::channel(token);
        Self(receiver)
    }

    /// Get the current token.
    ///
    /// This always clones the token to avoid blocking the publisher.
    #[must_use]
    pub fn token(&self) -> SecretString {
        self.0.borrow().clone()
    }

    /// Wait for the token to change.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::ChannelClosed` if the publisher is dropped.
    pub async fn changed(&mut self) -> Result<(), TokenError> {
        self.0
            .changed()
            .await
            .map_err(|_| TokenError::ChannelClosed)
    }
}

impl std::fmt::Debug for TokenReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenReceiver")
            .field("token", &"[REDACTED]")
            .finish()
    }
}
