//! Executor trait consumed by orchestration layers

use crate::client::ExecutionClient;
use crate::error::Result;
use crate::extract::extract_python_blocks;
use crate::types::{CodeFragment, ExecutionOutcome};
use async_trait::async_trait;

/// Executes code blocks on behalf of an agent
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Execute `blocks` in order and aggregate their output
    async fn execute_code_blocks(&self, blocks: &[CodeFragment]) -> Result<ExecutionOutcome>;

    /// Pull the runnable blocks out of an agent message
    fn extract_code_blocks(&self, message: &str) -> Vec<CodeFragment> {
        extract_python_blocks(message)
    }

    /// Get executor name
    fn name(&self) -> &str;
}

#[async_trait]
impl CodeExecutor for ExecutionClient {
    async fn execute_code_blocks(&self, blocks: &[CodeFragment]) -> Result<ExecutionOutcome> {
        self.execute(blocks).await
    }

    fn name(&self) -> &str {
        "session-pool"
    }
}
