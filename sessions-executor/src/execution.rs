//! Batch state machine
//!
//! `Pending → Running → {Succeeded | PartiallyFailed | Aborted}`. Sandbox
//! errors mark the batch as partially failed and let it continue; transport
//! errors abort it. Output accumulated before termination is always kept.

use crate::error::TransportError;
use crate::types::{BatchState, ExecutionOutcome};
use crate::wire::ExecuteResponse;
use serde::{Deserialize, Serialize};

/// Unique batch identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub uuid::Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Prefix of the log line recorded when a request cannot be completed
pub const TRANSPORT_ERROR_PREFIX: &str = "Error while sending code block to endpoint: ";

/// Accumulates the outcome of one batch
#[derive(Debug)]
pub struct Batch {
    id: ExecutionId,
    state: BatchState,
    log: String,
    exit_code: i32,
    error_detail: Option<String>,
    submitted: usize,
    total: usize,
    sandbox_failed: bool,
}

impl Batch {
    pub fn new(total: usize) -> Self {
        Self {
            id: ExecutionId::new(),
            state: BatchState::Pending,
            log: String::new(),
            exit_code: 0,
            error_detail: None,
            submitted: 0,
            total,
            sandbox_failed: false,
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn start(&mut self) {
        self.transition(BatchState::Running);
    }

    /// Count a request as sent
    pub fn record_submission(&mut self) {
        debug_assert_eq!(self.state, BatchState::Running);
        self.submitted += 1;
    }

    /// Fold a successful response into the log
    pub fn record_response(&mut self, response: &ExecuteResponse) {
        debug_assert_eq!(self.state, BatchState::Running);

        if let Some(stdout) = &response.stdout {
            self.log.push_str(stdout);
        }
        if let Some(stderr) = &response.stderr {
            self.log.push_str(stderr);
        }
        if let Some(result) = response.result_text() {
            self.log.push_str(&result);
        }
        if let Some(error) = response.error_text() {
            self.log.push('\n');
            self.log.push_str(&error);
            self.exit_code = 1;
            self.sandbox_failed = true;
            self.error_detail = Some(error);
        }
    }

    /// Record a transport failure and stop the batch
    pub fn abort(&mut self, error: &TransportError) {
        let detail = format!("{}{}", TRANSPORT_ERROR_PREFIX, error);
        self.log.push('\n');
        self.log.push_str(&detail);
        self.exit_code = 1;
        self.error_detail = Some(detail);
        self.transition(BatchState::Aborted);
    }

    /// Stop the batch without touching the log
    ///
    /// Used when the failure is raised to the caller rather than recorded.
    pub fn interrupt(mut self, detail: impl Into<String>) -> ExecutionOutcome {
        self.exit_code = 1;
        self.error_detail = Some(detail.into());
        self.transition(BatchState::Aborted);
        self.into_outcome()
    }

    pub fn is_aborted(&self) -> bool {
        self.state == BatchState::Aborted
    }

    /// Settle the terminal state and hand over the outcome
    pub fn finish(mut self) -> ExecutionOutcome {
        if self.state == BatchState::Pending {
            self.transition(BatchState::Running);
        }
        if self.state == BatchState::Running {
            let terminal = if self.sandbox_failed {
                BatchState::PartiallyFailed
            } else {
                BatchState::Succeeded
            };
            self.transition(terminal);
        }
        self.into_outcome()
    }

    fn transition(&mut self, next: BatchState) {
        debug_assert!(
            !self.state.is_terminal(),
            "batch already terminal: {}",
            self.state
        );
        tracing::trace!(execution_id = %self.id, from = %self.state, to = %next, "Batch transition");
        self.state = next;
    }

    fn into_outcome(self) -> ExecutionOutcome {
        ExecutionOutcome {
            combined_log: self.log,
            exit_code: self.exit_code,
            error_detail: self.error_detail,
            state: self.state,
            fragments_submitted: self.submitted,
            fragments_total: self.total,
        }
    }
}
