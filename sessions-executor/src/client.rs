//! Session pool execution client - main entry point

use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, Result, TransportError};
use crate::execution::Batch;
use crate::extract::extract_python_blocks;
use crate::types::{CodeFragment, ExecutionOutcome};
use crate::wire::{ExecuteRequest, ExecuteResponse};
use sessions_auth::{AccessToken, IdentityProvider, TokenCache};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Client for a remote session pool
///
/// Fragments of a batch run one after another; the token cache is the only
/// state shared between concurrent `execute` calls.
pub struct ExecutionClient {
    execute_url: Url,
    identifier: String,
    scope: String,
    timeout_in_seconds: u64,
    tokens: Arc<TokenCache>,
    http: reqwest::Client,
}

impl ExecutionClient {
    /// Create a client sharing an existing token cache
    pub fn new(config: ExecutorConfig, tokens: Arc<TokenCache>) -> Result<Self> {
        config.validate()?;

        let execute_url = execute_url(&config.pool_management_endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ExecutorError::HttpClient(e.to_string()))?;

        let identifier = config
            .identifier
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(Self {
            execute_url,
            identifier,
            scope: config.scope,
            timeout_in_seconds: config.execution_timeout.as_secs(),
            tokens,
            http,
        })
    }

    /// Create a client with its own token cache over `provider`
    pub fn with_provider(
        config: ExecutorConfig,
        provider: impl IdentityProvider + 'static,
    ) -> Result<Self> {
        let margin = chrono::Duration::from_std(config.refresh_margin)
            .map_err(|e| ExecutorError::Config(format!("refresh margin out of range: {}", e)))?;
        let tokens = TokenCache::new(provider).with_refresh_margin(margin);
        Self::new(config, Arc::new(tokens))
    }

    /// Session identifier sent with every request
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Fully resolved execute endpoint
    pub fn execute_url(&self) -> &Url {
        &self.execute_url
    }

    pub fn token_cache(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Run `fragments` in order and aggregate their output
    ///
    /// A sandbox-reported error marks the outcome as failed and moves on to
    /// the next fragment; a transport error stops the batch. Only token
    /// acquisition failures are returned as `Err`.
    pub async fn execute(&self, fragments: &[CodeFragment]) -> Result<ExecutionOutcome> {
        let mut batch = Batch::new(fragments.len());
        info!(
            execution_id = %batch.id(),
            identifier = %self.identifier,
            fragments = fragments.len(),
            "Executing batch"
        );
        batch.start();

        for (index, fragment) in fragments.iter().enumerate() {
            let token = match self.tokens.get_token(&self.scope).await {
                Ok(token) => token,
                Err(source) => {
                    warn!(execution_id = %batch.id(), fragment = index, error = %source, "Token acquisition failed");
                    let partial = batch.interrupt(source.to_string());
                    return Err(ExecutorError::Auth {
                        source,
                        partial: Box::new(partial),
                    });
                }
            };

            debug!(
                execution_id = %batch.id(),
                fragment = index,
                code_len = fragment.source().len(),
                "Submitting fragment"
            );
            batch.record_submission();

            match self.submit(&token, fragment).await {
                Ok(response) => {
                    if let Some(error) = response.error_text() {
                        debug!(execution_id = %batch.id(), fragment = index, %error, "Sandbox reported an error");
                    }
                    batch.record_response(&response);
                }
                Err(err) => {
                    warn!(
                        execution_id = %batch.id(),
                        fragment = index,
                        timed_out = err.is_timeout(),
                        error = %err,
                        "Transport failure, aborting batch"
                    );
                    if err.is_unauthorized() {
                        self.tokens.invalidate_if(&self.scope, &token).await;
                    }
                    batch.abort(&err);
                    break;
                }
            }
        }

        let execution_id = batch.id();
        let outcome = batch.finish();
        info!(
            execution_id = %execution_id,
            state = %outcome.state,
            exit_code = outcome.exit_code,
            submitted = outcome.fragments_submitted,
            "Batch finished"
        );
        Ok(outcome)
    }

    /// Run the python blocks fenced in an agent message
    pub async fn execute_markdown(&self, message: &str) -> Result<ExecutionOutcome> {
        let fragments = extract_python_blocks(message);
        self.execute(&fragments).await
    }

    async fn submit(
        &self,
        token: &AccessToken,
        fragment: &CodeFragment,
    ) -> std::result::Result<ExecuteResponse, TransportError> {
        let body = ExecuteRequest::inline(
            &self.identifier,
            fragment.source(),
            self.timeout_in_seconds,
        );

        let response = self
            .http
            .post(self.execute_url.clone())
            .bearer_auth(token.secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status,
                url: self.execute_url.to_string(),
            });
        }

        Ok(response.json::<ExecuteResponse>().await?)
    }
}

/// `{endpoint}/python/execute`, keeping any query on the endpoint
fn execute_url(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint.trim()).map_err(|e| {
        ExecutorError::Config(format!("Invalid pool management endpoint '{}': {}", endpoint, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExecutorError::Config(format!(
            "Pool management endpoint must be http(s): {}",
            endpoint
        )));
    }

    url.path_segments_mut()
        .map_err(|_| {
            ExecutorError::Config(format!("Pool management endpoint cannot be a base: {}", endpoint))
        })?
        .pop_if_empty()
        .extend(["python", "execute"]);

    Ok(url)
}
