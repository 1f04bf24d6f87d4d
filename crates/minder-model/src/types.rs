use serde::{Deserialize, Serialize};

// ─── Message types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One tool invocation requested by the model.
///
/// `arguments` is the raw JSON-encoded argument object exactly as the
/// provider produced it.  It is parsed once, at the tool-executor boundary,
/// never earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque identifier minted by the provider (forwarded verbatim).
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// A single message in the conversation history.
///
/// Assistant messages optionally carry `tool_calls`; tool messages carry the
/// `tool_call_id` of the call they answer.  Everything else is plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: text.into(), tool_calls: None, tool_call_id: None }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: text.into(), tool_calls: None, tool_call_id: None }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: text.into(), tool_calls: None, tool_call_id: None }
    }

    /// Assistant message that carries the raw tool-call descriptors alongside
    /// any interim text the model produced in the same turn.
    pub fn assistant_with_calls(text: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    /// Approximate token count used for context accounting (chars/4).
    pub fn approx_tokens(&self) -> usize {
        let mut chars = self.content.len();
        if let Some(calls) = &self.tool_calls {
            chars += calls.iter().map(|c| c.name.len() + c.arguments.len()).sum::<usize>();
        }
        (chars / 4).max(1)
    }
}

/// A tool schema provided to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object
    pub parameters: serde_json::Value,
}

/// Token usage from one completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
