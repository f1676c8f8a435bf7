//! Client identity and credential encoding.
//!
//! The identity a client announces in `Hello` depends on the deployment
//! environment. It is resolved once from configuration and passed into each
//! session rather than read from process-wide state.

use common::secret::{ExposeSecret, SecretString};
use nexus_protocol::messages::{AuthorizeRequest, ClientType};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// User agent announced to production streaming hosts.
pub const PRODUCTION_USER_AGENT: &str = "iPhone iOS 15.4 Dropcam/5.67.0.6";

/// User agent announced to field-test streaming hosts.
pub const FIELD_TEST_USER_AGENT: &str = "iPhone iOS 15.4 Dropcam/5.67.0.6 FT";

/// Deployment environment of the camera service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    FieldTest,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "field_test" | "fieldtest" | "ft" => Ok(Self::FieldTest),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// How the access token is carried in `AuthorizeRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Google account token, sent as `olive_token`.
    #[default]
    Google,
    /// Legacy account token, sent as `session_token`.
    Nest,
}

impl TokenKind {
    /// Encode `token` into an authorization payload.
    #[must_use]
    pub fn authorize_request(self, token: &SecretString) -> AuthorizeRequest {
        let token = token.expose_secret().to_string();
        match self {
            Self::Google => AuthorizeRequest {
                olive_token: token,
                ..AuthorizeRequest::default()
            },
            Self::Nest => AuthorizeRequest {
                session_token: token,
                ..AuthorizeRequest::default()
            },
        }
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "nest" => Ok(Self::Nest),
            other => Err(format!("unknown token kind '{other}'")),
        }
    }
}

/// What the client announces about itself in `Hello`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: String,
    pub client_type: ClientType,
}

impl ClientIdentity {
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        let user_agent = match environment {
            Environment::Production => PRODUCTION_USER_AGENT,
            Environment::FieldTest => FIELD_TEST_USER_AGENT,
        };
        Self {
            user_agent: user_agent.to_string(),
            client_type: ClientType::Ios,
        }
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self::for_environment(Environment::Production)
    }
}
