//! # Nexus Test Utilities
//!
//! Shared test utilities for the NexusTalk streamer.
//!
//! Sessions reach the network only through the `Connector` trait, so these
//! mocks let integration tests drive a real session actor against a
//! scripted streaming host over in-memory streams.
//!
//! ## Modules
//!
//! - `mock_connector` - `Connector` whose connection attempts the test resolves
//! - `mock_host` - Scripted streaming host speaking the frame protocol
//! - `fixtures` - Session settings, tokens and channel-backed sinks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nexus_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let (connector, mut connections) = MockConnector::new();
//!     let (_publisher, token) = test_token();
//!     let sinks = TestSinks::new();
//!     let (handle, _task) =
//!         spawn_session(test_session_config("host-a"), connector, token, sinks.sinks);
//!
//!     handle.start_playback().await.unwrap();
//!     let mut host = connections.next().await.accept();
//!     host.expect_hello().await;
//!     host.send_ok().await;
//!     host.expect_start_playback().await;
//! }
//! ```

pub mod fixtures;
pub mod mock_connector;
pub mod mock_host;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_connector::*;
pub use mock_host::*;
