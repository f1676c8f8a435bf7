//! Common utilities and types shared across the streamer crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for the access-token channel fed by the credential provider
pub mod token;

/// Module for shared observability configuration
pub mod config;
