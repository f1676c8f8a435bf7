//! NexusTalk streaming protocol.
//!
//! This crate implements the length-prefixed binary protocol spoken by a
//! camera's direct streaming host: the frame layer that reassembles packets
//! from a byte stream, and the message codec that turns frame bodies into
//! typed packets.
//!
//! Frame format:
//!
//! ```text
//! type (1 byte) | length (2 bytes BE, or 4 bytes BE for LONG_PLAYBACK_PACKET) | body
//! ```

#![warn(clippy::pedantic)]

pub mod codec;
pub mod frame;
pub mod messages;
pub mod packet;

pub use codec::{CodecError, Packet};
pub use frame::{Frame, FrameBuffer, FrameError, NexusCodec};
pub use packet::PacketType;
