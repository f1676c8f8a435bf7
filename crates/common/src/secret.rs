//! Secret types for protecting camera credentials from accidental logging.
//!
//! Re-exports types from the [`secrecy`] crate. Every access token, session
//! token or API key handled by the streamer is held as a `SecretString`, so
//! any struct deriving `Debug` around one gets redacted output for free and
//! the value is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct CameraCredentials {
//!     camera_uuid: String,
//!     access_token: SecretString,
//! }
//!
//! let creds = CameraCredentials {
//!     camera_uuid: "0a1b2c".to_string(),
//!     access_token: SecretString::from("ya29.token"),
//! };
//!
//! // Safe: access_token prints as [REDACTED]
//! println!("{creds:?}");
//!
//! // The raw value is only reachable through an explicit call
//! let token: &str = creds.access_token.expose_secret();
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
