//! The `Tool` trait and its input/output types.

use std::time::Duration;

use async_trait::async_trait;

/// Failure raised by a single tool invocation.
///
/// Distinct from [`crate::error::ToolError`], which also names the tool and
/// covers dispatch failures such as an unknown tool name.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    /// Attach the tool name for reporting above the tool layer.
    pub fn into_dispatch_error(self, name: &str) -> crate::error::ToolError {
        match self {
            Self::InvalidParameters(reason) => crate::error::ToolError::InvalidParameters {
                name: name.to_string(),
                reason,
            },
            Self::ExecutionFailed(reason) => crate::error::ToolError::ExecutionFailed {
                name: name.to_string(),
                reason,
            },
        }
    }
}

/// What a tool hands back to the model.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub result: serde_json::Value,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>, duration: Duration) -> Self {
        Self {
            result: serde_json::Value::String(text.into()),
            duration,
        }
    }

    /// The result as the text placed in the conversation.
    pub fn as_text(&self) -> String {
        match &self.result {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the parameters object.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError>;
}

/// Fetch a required string parameter.
pub fn require_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing required parameter: {key}")))
}

/// Read an optional integer parameter, tolerating numbers sent as floats
/// or strings.
pub fn optional_i64(
    params: &serde_json::Value,
    key: &str,
    default: i64,
) -> Result<i64, ToolError> {
    let invalid = || ToolError::InvalidParameters(format!("{key} must be an integer"));
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(invalid),
        Some(serde_json::Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}
