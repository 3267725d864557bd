//! Read-through token cache
//!
//! One slot per scope. Cached reads take only the slot's read lock; a refresh
//! takes the slot's acquisition mutex so at most one provider call is in
//! flight per scope. Callers that queued behind a refresh receive the token
//! it produced instead of issuing their own provider call.

use crate::error::Result;
use crate::provider::IdentityProvider;
use crate::token::AccessToken;
use crate::DEFAULT_REFRESH_MARGIN_SECS;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

#[derive(Default)]
struct SlotState {
    token: Option<AccessToken>,
    /// Bumped on every successful acquisition
    generation: u64,
}

#[derive(Default)]
struct ScopeSlot {
    state: RwLock<SlotState>,
    acquire: Mutex<()>,
}

/// Per-scope cache in front of an [`IdentityProvider`]
pub struct TokenCache {
    provider: Arc<dyn IdentityProvider>,
    refresh_margin: Duration,
    slots: RwLock<HashMap<String, Arc<ScopeSlot>>>,
}

impl TokenCache {
    /// Create a cache with the default 5 minute refresh margin
    pub fn new(provider: impl IdentityProvider + 'static) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    /// Create a cache over a shared provider
    pub fn from_arc(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            refresh_margin: Duration::seconds(DEFAULT_REFRESH_MARGIN_SECS),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Set how long before expiry a token is considered stale
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Current refresh margin
    pub fn refresh_margin(&self) -> Duration {
        self.refresh_margin
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Return a usable token for `scope`, acquiring one if needed
    pub async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let slot = self.slot(scope).await;

        let seen_generation = {
            let state = slot.state.read().await;
            if let Some(token) = state.token.as_ref().filter(|t| self.is_fresh(t)) {
                trace!(scope, "Access token cache hit");
                return Ok(token.clone());
            }
            state.generation
        };

        let _acquire = slot.acquire.lock().await;

        {
            let state = slot.state.read().await;
            if let Some(token) = &state.token {
                // A refresh completed while we waited: share its result even if
                // the provider issued a short-lived token.
                let refreshed_meanwhile = state.generation != seen_generation
                    && token.remaining(Utc::now()) > Duration::zero();
                if refreshed_meanwhile || self.is_fresh(token) {
                    trace!(scope, "Access token refreshed by concurrent caller");
                    return Ok(token.clone());
                }
            }
        }

        debug!(scope, provider = self.provider.name(), "Acquiring access token");
        let token = self.provider.get_token(scope).await.map_err(|err| {
            warn!(scope, provider = self.provider.name(), error = %err, "Token acquisition failed");
            err
        })?;

        let mut state = slot.state.write().await;
        state.token = Some(token.clone());
        state.generation += 1;
        info!(scope, expires_at = %token.expires_at(), "Access token refreshed");

        Ok(token)
    }

    /// Currently cached token for `scope`, fresh or not
    pub async fn cached(&self, scope: &str) -> Option<AccessToken> {
        let slot = self.slots.read().await.get(scope).cloned()?;
        let state = slot.state.read().await;
        state.token.clone()
    }

    /// Drop the cached token for `scope`; the next call re-acquires
    pub async fn invalidate(&self, scope: &str) {
        if let Some(slot) = self.slots.read().await.get(scope).cloned() {
            slot.state.write().await.token = None;
            debug!(scope, "Access token invalidated");
        }
    }

    /// Drop the cached token for `scope` only if it is still `rejected`
    ///
    /// Returns whether anything was dropped. A token another caller already
    /// refreshed is left in place.
    pub async fn invalidate_if(&self, scope: &str, rejected: &AccessToken) -> bool {
        let Some(slot) = self.slots.read().await.get(scope).cloned() else {
            return false;
        };
        let mut state = slot.state.write().await;
        if state.token.as_ref() != Some(rejected) {
            trace!(scope, "Rejected token already replaced");
            return false;
        }
        state.token = None;
        debug!(scope, "Rejected access token invalidated");
        true
    }

    fn is_fresh(&self, token: &AccessToken) -> bool {
        token.is_usable_at(Utc::now(), self.refresh_margin)
    }

    async fn slot(&self, scope: &str) -> Arc<ScopeSlot> {
        if let Some(slot) = self.slots.read().await.get(scope) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(scope.to_string())
            .or_default()
            .clone()
    }
}
