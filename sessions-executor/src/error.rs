use crate::types::ExecutionOutcome;
use sessions_auth::AuthError;
use thiserror::Error;

/// Errors surfaced to the caller of the execution client
///
/// Transport and sandbox failures are recorded in the [`ExecutionOutcome`]
/// instead; only authentication and construction problems escape.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Authentication failed: {source}")]
    Auth {
        source: AuthError,
        /// Output produced before the failure (empty if no fragment ran)
        partial: Box<ExecutionOutcome>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl ExecutorError {
    /// Output produced before an authentication failure
    pub fn partial_outcome(&self) -> Option<&ExecutionOutcome> {
        match self {
            ExecutorError::Auth { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Failure reaching the session pool; aborts the batch
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP status {status} for url ({url})")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("{0}")]
    Request(#[from] reqwest::Error),
}

impl TransportError {
    /// The pool rejected our bearer token
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            TransportError::Status { status, .. } if *status == reqwest::StatusCode::UNAUTHORIZED
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Request(err) if err.is_timeout())
    }
}
