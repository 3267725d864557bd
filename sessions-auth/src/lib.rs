//! # sessions-auth: access tokens for session pool requests
//!
//! Every request to a session pool carries a bearer token issued by an
//! identity provider for the pool's audience. This crate acquires those
//! tokens and caches them per scope.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────┐
//! │   EXECUTION CLIENT          │
//! │   get_token(scope)          │
//! └─────────────────────────────┘
//!               ↓
//! ┌─────────────────────────────┐
//! │   TOKEN CACHE               │
//! │   one slot per scope        │
//! │   refresh inside margin     │
//! └─────────────────────────────┘
//!               ↓
//! ┌─────────────────────────────┐
//! │   IDENTITY PROVIDER         │
//! │   static / client secret /  │
//! │   managed identity / chain  │
//! └─────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod credentials;
pub mod error;
pub mod provider;
pub mod token;

// Re-exports for convenience
pub use cache::TokenCache;
pub use credentials::{
    ChainedCredential, ClientSecretCredential, DefaultCredential, ManagedIdentityCredential,
};
pub use error::{AuthError, Result};
pub use provider::{IdentityProvider, StaticTokenProvider};
pub use token::AccessToken;

/// Audience of the session pool management API
pub const SESSIONS_SCOPE: &str = "https://dynamicsessions.io/.default";

/// Tokens expiring within this many seconds are refreshed before use
pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 300;
