//! Static-key authenticator.
//!
//! Validates `Authorization: Bearer <key>.<subject>` against a single
//! configured key and yields the subject as the identity. Meant for
//! deployments where the real token service sits elsewhere and the gateway
//! only needs a shared-secret gate; anything richer implements
//! [`Authenticator`](crate::auth::Authenticator) instead.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::auth::{AuthError, Authenticator, Identity};

/// Authenticator backed by one shared key.
pub struct StaticTokenAuthenticator {
    api_key: String,
}

impl StaticTokenAuthenticator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(
        &self,
        params: &HashMap<String, serde_json::Value>,
    ) -> Result<Identity, AuthError> {
        let header = params
            .get("authorization")
            .and_then(|value| value.as_str())
            .ok_or_else(|| AuthError::new("missing authorization credentials"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthError::new("invalid token format: expected Bearer scheme"))?;

        let (key, subject) = token
            .split_once('.')
            .ok_or_else(|| AuthError::new("invalid token format: expected <key>.<subject>"))?;

        if key != self.api_key {
            return Err(AuthError::new("authentication failed: unknown key"));
        }
        if subject.is_empty() {
            return Err(AuthError::new("invalid token format: empty subject"));
        }

        Ok(Identity::new(subject))
    }
}
