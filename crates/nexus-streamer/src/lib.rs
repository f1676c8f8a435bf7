//! NexusTalk streaming client.
//!
//! Streams live video and audio from a camera's direct streaming host and
//! feeds them to external consumers (transcoders, FIFOs, files):
//!
//! - One session actor per playback request owns the TLS connection,
//!   authorization, keepalive, redirects and re-authorization
//! - Decoded payloads are routed by channel id to the video and audio sinks
//! - Return audio from a talkback source is sent upstream with an explicit
//!   end-of-speech marker
//!
//! # Architecture
//!
//! ```text
//! caller ──StreamSessionHandle──> StreamSession (actor, per playback)
//!                                  ├── connection (TLS, port 1443)
//!                                  ├── FrameBuffer -> Packet dispatch
//!                                  ├── MediaRouter -> video / audio MediaSink
//!                                  └── talkback forwarder (task)
//! ```
//!
//! # Modules
//!
//! - [`session`] - Session state machine actor
//! - [`sink`] - Media sinks and payload routing
//! - [`talkback`] - Return audio forwarding
//! - [`transport`] - Connector trait and TLS connector
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod errors;
pub mod identity;
pub mod observability;
pub mod profiles;
pub mod session;
pub mod sink;
pub mod talkback;
pub mod transport;

pub use errors::StreamerError;
pub use session::{SessionConfig, SessionState, SessionStatus, StreamSession, StreamSessionHandle};
pub use sink::{MediaSink, MediaSinks, SinkKind};
pub use transport::{Connector, TlsConnector};
