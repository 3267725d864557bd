//! Execution client configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file,
//! the environment. Callers layer command-line overrides on top.

use crate::error::{ExecutorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default sandbox-side execution timeout
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(100);

/// Default HTTP timeout for a single execute request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(100);

/// Default refresh margin for cached tokens
pub const DEFAULT_REFRESH_MARGIN: Duration =
    Duration::from_secs(sessions_auth::DEFAULT_REFRESH_MARGIN_SECS as u64);

/// Environment variables holding the pool management endpoint, in priority order
pub const ENDPOINT_ENV_VARS: [&str; 2] = ["POOL_MANAGEMENT_ENDPOINT", "ACA_SESSIONS_ENDPOINT"];

/// Resolved configuration of an execution client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorConfig {
    /// Base URL of the session pool management API
    pub pool_management_endpoint: String,

    /// Token audience for the pool
    pub scope: String,

    /// Session identifier sent with every request (random per client when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    /// Sandbox-side execution timeout, sent as `timeoutInSeconds`
    #[serde(with = "humantime_serde")]
    pub execution_timeout: Duration,

    /// HTTP timeout for each execute request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Tokens expiring within this margin are refreshed before use
    #[serde(with = "humantime_serde")]
    pub refresh_margin: Duration,
}

/// On-disk form; every key optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    pool_management_endpoint: Option<String>,
    scope: Option<String>,
    identifier: Option<String>,
    #[serde(with = "humantime_serde")]
    execution_timeout: Option<Duration>,
    #[serde(with = "humantime_serde")]
    request_timeout: Option<Duration>,
    #[serde(with = "humantime_serde")]
    refresh_margin: Option<Duration>,
}

impl ExecutorConfig {
    /// Defaults for everything but the endpoint
    pub fn new(pool_management_endpoint: impl Into<String>) -> Self {
        Self {
            pool_management_endpoint: pool_management_endpoint.into(),
            scope: sessions_auth::SESSIONS_SCOPE.to_string(),
            identifier: None,
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Load from an optional TOML file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_endpoint(path, None)
    }

    /// Same as [`load`](Self::load), with `endpoint` taking precedence over
    /// every other endpoint source
    pub fn load_with_endpoint(path: Option<&Path>, endpoint: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
                ExecutorError::Config(format!("Failed to read {}: {}", path.display(), e))
            })?),
            None => None,
        };
        Self::from_sources_with_endpoint(file.as_deref(), endpoint, |key| {
            std::env::var(key).ok().filter(|v| !v.is_empty())
        })
    }

    /// Resolve from TOML text and an arbitrary variable source
    pub fn from_sources(
        file: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        Self::from_sources_with_endpoint(file, None, lookup)
    }

    /// Resolve from TOML text, an arbitrary variable source and an explicit
    /// endpoint that wins over both
    pub fn from_sources_with_endpoint(
        file: Option<&str>,
        endpoint: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file: ConfigFile = match file {
            Some(text) => toml::from_str(text)
                .map_err(|e| ExecutorError::Config(format!("Failed to parse config: {}", e)))?,
            None => ConfigFile::default(),
        };

        let endpoint = endpoint
            .map(str::to_string)
            .or_else(|| ENDPOINT_ENV_VARS.iter().find_map(|key| lookup(key)))
            .or(file.pool_management_endpoint)
            .ok_or_else(|| {
                ExecutorError::Config(format!(
                    "pool management endpoint is not set (config file or {})",
                    ENDPOINT_ENV_VARS.join(" / ")
                ))
            })?;

        let mut config = Self::new(endpoint);
        if let Some(scope) = lookup("SESSIONS_SCOPE").or(file.scope) {
            config.scope = scope;
        }
        config.identifier = lookup("SESSIONS_IDENTIFIER").or(file.identifier);
        if let Some(timeout) = file.execution_timeout {
            config.execution_timeout = timeout;
        }
        if let Some(timeout) = file.request_timeout {
            config.request_timeout = timeout;
        }
        if let Some(margin) = file.refresh_margin {
            config.refresh_margin = margin;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the client relies on
    pub fn validate(&self) -> Result<()> {
        if self.pool_management_endpoint.trim().is_empty() {
            return Err(ExecutorError::Config(
                "pool management endpoint is empty".to_string(),
            ));
        }
        if self.scope.trim().is_empty() {
            return Err(ExecutorError::Config("scope is empty".to_string()));
        }
        if self.execution_timeout.as_secs() == 0 {
            return Err(ExecutorError::Config(
                "execution timeout must be at least one second".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ExecutorError::Config(
                "request timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ExecutorError::Config(format!("Failed to serialize config: {}", e)))
    }
}
