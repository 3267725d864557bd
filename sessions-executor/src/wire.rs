//! JSON bodies exchanged with the session pool's `/python/execute` endpoint

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request envelope: `{ "properties": { ... } }`
#[derive(Debug, Serialize)]
pub struct ExecuteRequest<'a> {
    pub properties: ExecuteProperties<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteProperties<'a> {
    pub identifier: &'a str,
    pub code_input_type: CodeInputType,
    pub execution_type: ExecutionType,
    pub python_code: &'a str,
    pub timeout_in_seconds: u64,
}

impl<'a> ExecuteRequest<'a> {
    /// Inline, synchronous execution of `code`
    pub fn inline(identifier: &'a str, code: &'a str, timeout_in_seconds: u64) -> Self {
        Self {
            properties: ExecuteProperties {
                identifier,
                code_input_type: CodeInputType::Inline,
                execution_type: ExecutionType::Synchronous,
                python_code: code,
                timeout_in_seconds,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeInputType {
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    Synchronous,
}

/// Successful response body; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub stdout: Option<String>,

    #[serde(default)]
    pub stderr: Option<String>,

    /// Value of the last expression; `null` is the same as absent
    #[serde(default)]
    pub result: Option<Value>,

    #[serde(default)]
    pub error: Option<Value>,
}

impl ExecuteResponse {
    /// Rendered `result`, if the sandbox returned one
    pub fn result_text(&self) -> Option<String> {
        self.result.as_ref().map(render_value)
    }

    /// Rendered `error`, if the sandbox reported one
    pub fn error_text(&self) -> Option<String> {
        self.error
            .as_ref()
            .filter(|v| !v.is_null())
            .map(render_value)
    }
}

/// Strings render bare, everything else as compact JSON
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
