// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The error taxonomy every tool failure is mapped into.
///
/// Tools never surface Rust errors or stack traces to the model; they render
/// one of these codes inside the structured envelope instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    MissingRequired,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    Conflict,
    ConnectionTimeout,
    ServiceUnavailable,
    AuthFailed,
    InternalError,
    Bug,
}

/// The uniform failure payload carried inside the envelope.
///
/// `kind` (serialized as `type`) names the failure family the model can key
/// its recovery strategy on (`tool_not_found`, `shell_execution_failed`,
/// `query_execution_failed`, ...).  `recoverable` tells the model whether a
/// retry with adjusted input can succeed at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: ErrorCode,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub recoverable: bool,
    pub retry_after: Option<u64>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub context: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    error: ToolError,
}

impl ToolError {
    pub fn new(code: ErrorCode, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: kind.into(),
            message: message.into(),
            recoverable: false,
            retry_after: None,
            suggestions: Vec::new(),
            context: Value::Null,
        }
    }

    pub fn recoverable(mut self, yes: bool) -> Self {
        self.recoverable = yes;
        self
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// The `tool_not_found` error the registry returns for unknown names.
    pub fn tool_not_found(name: &str, known: &[String]) -> Self {
        Self::new(
            ErrorCode::NotFound,
            "tool_not_found",
            format!("no tool named '{name}' is registered"),
        )
        .context(serde_json::json!({ "available_tools": known }))
    }

    /// Shorthand for a missing required parameter.
    pub fn missing_required(param: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequired,
            "invalid_parameters",
            format!("required parameter '{param}' is missing"),
        )
        .recoverable(true)
        .suggest(format!("retry the call with '{param}' set"))
    }

    /// Render the structured envelope the loop and the model key on.
    pub fn render(self) -> String {
        serde_json::to_string(&Envelope { error: self })
            .expect("tool error envelope always serializes")
    }
}

/// Return `true` when `payload` parses as the structured error envelope.
///
/// The conversation loop uses this to decide whether to inject the
/// "answer the user in friendly prose" system nudge after a tool result.
pub fn is_error_envelope(payload: &str) -> bool {
    serde_json::from_str::<Envelope>(payload).is_ok()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
