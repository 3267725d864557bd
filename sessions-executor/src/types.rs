//! Core types for batch execution

use serde::{Deserialize, Serialize};
use std::fmt;

/// A piece of code submitted to the session pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFragment {
    /// The code to execute
    source: String,

    /// Language tag, when the fragment came from a fenced block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
}

impl CodeFragment {
    /// Create an untagged fragment
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            language: None,
        }
    }

    /// Attach a language tag
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Untagged fragments are assumed to be python
    pub fn is_python(&self) -> bool {
        match self.language.as_deref() {
            None => true,
            Some(lang) => matches!(
                lang.to_ascii_lowercase().as_str(),
                "python" | "py" | "python3" | "ipython"
            ),
        }
    }
}

impl From<&str> for CodeFragment {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for CodeFragment {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

/// Lifecycle of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Pending,
    Running,
    /// Every fragment ran, no sandbox error
    Succeeded,
    /// Every fragment ran, at least one sandbox error
    PartiallyFailed,
    /// Stopped early; later fragments were never submitted
    Aborted,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchState::Succeeded | BatchState::PartiallyFailed | BatchState::Aborted
        )
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchState::Pending => "pending",
            BatchState::Running => "running",
            BatchState::Succeeded => "succeeded",
            BatchState::PartiallyFailed => "partially_failed",
            BatchState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Aggregated result of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// stdout, stderr and result text of every processed fragment, in order
    pub combined_log: String,

    /// Exit code (0 = success)
    pub exit_code: i32,

    /// Most recent failure cause; its text also appears in `combined_log`
    pub error_detail: Option<String>,

    /// Terminal state of the batch
    pub state: BatchState,

    /// Fragments whose request was sent
    pub fragments_submitted: usize,

    /// Fragments in the batch
    pub fragments_total: usize,
}

impl ExecutionOutcome {
    /// Check if every fragment ran without error
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
