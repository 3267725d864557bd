//! Identity provider abstraction

use crate::error::Result;
use crate::token::AccessToken;
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;

/// Source of bearer tokens for an authorization scope
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Acquire a new token for `scope`
    ///
    /// Implementations never cache; caching belongs to
    /// [`TokenCache`](crate::TokenCache).
    async fn get_token(&self, scope: &str) -> Result<AccessToken>;

    /// Provider name used in diagnostics
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        (**self).get_token(scope).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Provider serving a pre-issued token
///
/// Each acquisition reports the token as valid for `lifetime` from now, so a
/// cache in front of it re-reads the value once per lifetime.
#[derive(Clone)]
pub struct StaticTokenProvider {
    value: String,
    lifetime: Duration,
}

impl StaticTokenProvider {
    /// Default lifetime reported for a static token
    pub const DEFAULT_LIFETIME_MINUTES: i64 = 60;

    /// Serve `value` for every scope
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            lifetime: Duration::minutes(Self::DEFAULT_LIFETIME_MINUTES),
        }
    }

    /// Override the reported lifetime
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken> {
        Ok(AccessToken::expiring_in(self.value.clone(), self.lifetime))
    }

    fn name(&self) -> &str {
        "StaticTokenProvider"
    }
}
