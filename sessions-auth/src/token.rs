//! Bearer access tokens

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bearer token issued by an identity provider
///
/// Tokens are immutable: a refresh produces a new `AccessToken` that replaces
/// the old one as a whole.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Opaque bearer value
    value: String,

    /// Absolute expiry (UTC)
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Create a token from its bearer value and expiry
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Create a token expiring `lifetime` from now
    ///
    /// Lifetimes past the end of the representable calendar are clamped to
    /// its last instant.
    pub fn expiring_in(value: impl Into<String>, lifetime: Duration) -> Self {
        let expires_at = Utc::now()
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(value, expires_at)
    }

    /// Create a token expiring `lifetime_secs` from now, or `None` when the
    /// expiry cannot be represented
    pub fn try_expiring_in_secs(value: impl Into<String>, lifetime_secs: i64) -> Option<Self> {
        let lifetime = Duration::try_seconds(lifetime_secs)?;
        let expires_at = Utc::now().checked_add_signed(lifetime)?;
        Some(Self::new(value, expires_at))
    }

    /// Bearer value, suitable for an `Authorization: Bearer` header
    pub fn secret(&self) -> &str {
        &self.value
    }

    /// Expiry timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Remaining lifetime relative to `now` (negative once expired)
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Usable only while `now + margin < expires_at`
    ///
    /// A margin reaching past the representable calendar leaves no usable
    /// window.
    pub fn is_usable_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now.checked_add_signed(margin)
            .is_some_and(|deadline| deadline < self.expires_at)
    }

    /// Check usability against the current clock
    pub fn is_usable(&self, margin: Duration) -> bool {
        self.is_usable_at(Utc::now(), margin)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
