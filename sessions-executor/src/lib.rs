//! Session pool execution client
//!
//! Submits code fragments one at a time to a remote, pooled sandbox and folds
//! the responses into a single [`ExecutionOutcome`]. Bearer tokens come from a
//! shared [`sessions_auth::TokenCache`].

mod client;
mod config;
mod error;
mod execution;
mod executor;
mod extract;
mod types;
pub mod wire;

pub use client::ExecutionClient;
pub use config::{
    ExecutorConfig, DEFAULT_EXECUTION_TIMEOUT, DEFAULT_REFRESH_MARGIN, DEFAULT_REQUEST_TIMEOUT,
    ENDPOINT_ENV_VARS,
};
pub use error::{ExecutorError, Result, TransportError};
pub use execution::{Batch, ExecutionId, TRANSPORT_ERROR_PREFIX};
pub use executor::CodeExecutor;
pub use extract::{extract_code_blocks, extract_python_blocks, DEFAULT_LANGUAGE};
pub use types::{BatchState, CodeFragment, ExecutionOutcome};

/// Re-export of the token layer
pub use sessions_auth;
