//! Authentication seam.
//!
//! # Data Flow
//! ```text
//! Handshake request:
//!     → connection params assembled (authorization header + query pairs)
//!     → Authenticator::authenticate (external collaborator)
//!     → Ok(Identity) feeds the lease, Err(AuthError) feeds the failure
//!       ledger and the classified auth-failure metric
//! ```
//!
//! # Design Decisions
//! - The gateway owns no credential logic; anything that can turn connection
//!   params into an identity plugs in behind the trait
//! - Failure classification is best-effort text inspection, not a typed
//!   error contract, because upstream authenticators differ

pub mod static_token;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use static_token::StaticTokenAuthenticator;

/// Authenticated principal associated with a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive authentication failure from the upstream authenticator.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AuthError {
    message: String,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Turns connection credentials into an identity. External collaborator;
/// implementations live outside the admission subsystem.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve the handshake's connection params to an identity, failing
    /// with a descriptive error on invalid/missing/expired/revoked
    /// credentials.
    async fn authenticate(
        &self,
        params: &HashMap<String, serde_json::Value>,
    ) -> Result<Identity, AuthError>;
}

/// Classify an authenticator error message into a metrics reason code.
///
/// Upstream errors are free text, so this inspects the message rather than
/// demanding a typed contract. Unrecognized messages fall back to
/// `authentication_failed`.
pub fn classify_failure(message: &str) -> &'static str {
    let message = message.to_ascii_lowercase();
    if message.contains("missing") {
        "missing_authorization"
    } else if message.contains("format") || message.contains("malformed") {
        "invalid_token_format"
    } else if message.contains("expired") {
        "token_expired"
    } else if message.contains("revoked") {
        "token_revoked"
    } else {
        "authentication_failed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_known_categories() {
        assert_eq!(classify_failure("missing authorization header"), "missing_authorization");
        assert_eq!(classify_failure("invalid token format"), "invalid_token_format");
        assert_eq!(classify_failure("token expired at 12:00"), "token_expired");
        assert_eq!(classify_failure("token revoked by admin"), "token_revoked");
        assert_eq!(classify_failure("signature mismatch"), "authentication_failed");
    }
}
