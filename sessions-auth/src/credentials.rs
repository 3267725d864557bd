//! Credential implementations
//!
//! Implements the providers a session-pool client typically runs with:
//! 1. Client secret: OAuth2 client-credentials grant against an Entra authority
//! 2. Managed identity: the identity endpoint injected into App Service / Container Apps
//! 3. Chained: first provider that yields a token wins, diagnostics are aggregated

use crate::{
    error::{AuthError, Result},
    provider::{IdentityProvider, StaticTokenProvider},
    token::AccessToken,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Public-cloud authority used when `AZURE_AUTHORITY_HOST` is not set
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// API version of the App Service / Container Apps identity endpoint
pub const MANAGED_IDENTITY_API_VERSION: &str = "2019-08-01";

/// Successful response from an OAuth2 token endpoint
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    expires_in: i64,
}

/// Error body from an OAuth2 token endpoint
#[derive(Debug, Deserialize)]
struct TokenEndpointError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth2 client-credentials grant
#[derive(Clone)]
pub struct ClientSecretCredential {
    token_url: Url,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
}

impl ClientSecretCredential {
    /// Credential for `tenant_id` at `authority_host`
    pub fn new(
        authority_host: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        if tenant_id.is_empty() {
            return Err(AuthError::ConfigError("tenant id is empty".to_string()));
        }

        let authority = Url::parse(&format!("{}/", authority_host.trim_end_matches('/')))?;
        let token_url = authority.join(&format!("{}/oauth2/v2.0/token", tenant_id))?;

        Ok(Self {
            token_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            client: reqwest::Client::new(),
        })
    }

    /// Token endpoint this credential posts to
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }
}

#[async_trait]
impl IdentityProvider for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        debug!(scope, client_id = %self.client_id, "Requesting client-credentials token");

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejection(status.as_u16(), &body));
        }

        let body: TokenEndpointResponse = response.json().await?;
        AccessToken::try_expiring_in_secs(body.access_token, body.expires_in).ok_or_else(|| {
            AuthError::InvalidResponse(format!("expires_in out of range: {}", body.expires_in))
        })
    }

    fn name(&self) -> &str {
        "ClientSecretCredential"
    }
}

/// `expires_on` is a string of epoch seconds on most hosts, a number on some
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EpochSeconds {
    Number(i64),
    Text(String),
}

impl EpochSeconds {
    fn to_datetime(&self) -> Result<DateTime<Utc>> {
        let secs = match self {
            EpochSeconds::Number(n) => *n,
            EpochSeconds::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                AuthError::InvalidResponse(format!("expires_on is not epoch seconds: {}", s))
            })?,
        };
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| AuthError::InvalidResponse(format!("expires_on out of range: {}", secs)))
    }
}

#[derive(Debug, Deserialize)]
struct ManagedIdentityResponse {
    access_token: String,
    expires_on: EpochSeconds,
}

/// Identity endpoint exposed to hosted workloads
#[derive(Clone)]
pub struct ManagedIdentityCredential {
    endpoint: Url,
    identity_header: String,
    client_id: Option<String>,
    client: reqwest::Client,
}

impl ManagedIdentityCredential {
    /// Credential for the identity endpoint and its shared header secret
    pub fn new(endpoint: &str, identity_header: impl Into<String>) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            identity_header: identity_header.into(),
            client_id: None,
            client: reqwest::Client::new(),
        })
    }

    /// Select a user-assigned identity
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// The identity endpoint takes a resource, not a scope
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

#[async_trait]
impl IdentityProvider for ManagedIdentityCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let resource = scope_to_resource(scope);
        debug!(scope, resource, "Requesting managed identity token");

        let mut query = vec![
            ("api-version", MANAGED_IDENTITY_API_VERSION),
            ("resource", resource),
        ];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let response = self
            .client
            .get(self.endpoint.clone())
            .header("X-IDENTITY-HEADER", &self.identity_header)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejection(status.as_u16(), &body));
        }

        let body: ManagedIdentityResponse = response.json().await?;
        Ok(AccessToken::new(
            body.access_token,
            body.expires_on.to_datetime()?,
        ))
    }

    fn name(&self) -> &str {
        "ManagedIdentityCredential"
    }
}

fn rejection(status: u16, body: &str) -> AuthError {
    let message = match serde_json::from_str::<TokenEndpointError>(body) {
        Ok(err) => match err.error_description {
            Some(description) => format!("{}: {}", err.error, description),
            None => err.error,
        },
        Err(_) if body.is_empty() => "empty response body".to_string(),
        Err(_) => body.to_string(),
    };
    AuthError::Rejected { status, message }
}

/// Placeholder for a provider whose configuration is absent
struct UnavailableCredential {
    name: &'static str,
    reason: String,
}

#[async_trait]
impl IdentityProvider for UnavailableCredential {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken> {
        Err(AuthError::ConfigError(self.reason.clone()))
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Tries each provider in order
///
/// Providers that report missing configuration are skipped; the first
/// provider that reaches its identity service decides the outcome.
#[derive(Clone)]
pub struct ChainedCredential {
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl ChainedCredential {
    /// Chain over `providers`, tried in order
    pub fn new(providers: Vec<Arc<dyn IdentityProvider>>) -> Self {
        Self { providers }
    }

    /// Append a provider to the chain
    pub fn with(mut self, provider: impl IdentityProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Names of the chained providers, in order
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

#[async_trait]
impl IdentityProvider for ChainedCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut messages = Vec::new();

        for provider in &self.providers {
            match provider.get_token(scope).await {
                Ok(token) => {
                    debug!(provider = provider.name(), scope, "Credential produced a token");
                    return Ok(token);
                }
                Err(AuthError::ConfigError(reason)) => {
                    messages.push(format!("{}: {}", provider.name(), reason));
                }
                Err(AuthError::CredentialUnavailable { messages: inner }) => {
                    messages.extend(inner);
                }
                Err(err) => {
                    warn!(provider = provider.name(), scope, error = %err, "Credential failed");
                    messages.push(format!("{}: {}", provider.name(), err));
                    return Err(AuthError::CredentialUnavailable { messages });
                }
            }
        }

        if messages.is_empty() {
            messages.push("no credentials configured".to_string());
        }
        Err(AuthError::CredentialUnavailable { messages })
    }

    fn name(&self) -> &str {
        "ChainedCredential"
    }
}

/// Environment-driven credential chain
///
/// Order: `SESSIONS_ACCESS_TOKEN` (static), `AZURE_TENANT_ID` +
/// `AZURE_CLIENT_ID` + `AZURE_CLIENT_SECRET` (client secret, honouring
/// `AZURE_AUTHORITY_HOST`), `IDENTITY_ENDPOINT` + `IDENTITY_HEADER`
/// (managed identity, honouring `AZURE_CLIENT_ID` for user-assigned
/// identities).
pub struct DefaultCredential;

impl DefaultCredential {
    /// Build the chain from the process environment
    pub fn from_env() -> ChainedCredential {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Build the chain from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ChainedCredential {
        let mut providers: Vec<Arc<dyn IdentityProvider>> = Vec::new();

        if let Some(token) = lookup("SESSIONS_ACCESS_TOKEN") {
            providers.push(Arc::new(StaticTokenProvider::new(token)));
        }

        let client_id = lookup("AZURE_CLIENT_ID");
        providers.push(
            match (
                lookup("AZURE_TENANT_ID"),
                client_id.clone(),
                lookup("AZURE_CLIENT_SECRET"),
            ) {
                (Some(tenant), Some(client), Some(secret)) => {
                    let authority = lookup("AZURE_AUTHORITY_HOST")
                        .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());
                    match ClientSecretCredential::new(&authority, &tenant, client, secret) {
                        Ok(credential) => Arc::new(credential),
                        Err(err) => unavailable("EnvironmentCredential", err.to_string()),
                    }
                }
                _ => unavailable(
                    "EnvironmentCredential",
                    "AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET are not all set."
                        .to_string(),
                ),
            },
        );

        providers.push(
            match (lookup("IDENTITY_ENDPOINT"), lookup("IDENTITY_HEADER")) {
                (Some(endpoint), Some(header)) => {
                    match ManagedIdentityCredential::new(&endpoint, header) {
                        Ok(credential) => match client_id {
                            Some(id) => Arc::new(credential.with_client_id(id)),
                            None => Arc::new(credential),
                        },
                        Err(err) => unavailable("ManagedIdentityCredential", err.to_string()),
                    }
                }
                _ => unavailable(
                    "ManagedIdentityCredential",
                    "IDENTITY_ENDPOINT and IDENTITY_HEADER are not set.".to_string(),
                ),
            },
        );

        ChainedCredential::new(providers)
    }
}

fn unavailable(name: &'static str, reason: String) -> Arc<dyn IdentityProvider> {
    Arc::new(UnavailableCredential { name, reason })
}
