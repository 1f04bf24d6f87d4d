use async_trait::async_trait;

use crate::{Message, ToolCallRequest, ToolSchema, Usage};

/// One completion request against a configured provider/model pair.
///
/// `provider_key` selects the upstream account/endpoint; the transport that
/// interprets it lives behind [`LlmClient`] and is injected by the host
/// application.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub provider_key: String,
    pub model: String,
    pub messages: Vec<Message>,
    /// Tool schemas offered to the model.  Empty means tool use is disabled
    /// for this call.
    pub tools: Vec<ToolSchema>,
    pub temperature: Option<f32>,
}

/// The provider's answer to one [`ChatRequest`].
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<Usage>,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The seam to the LLM provider call abstraction.
///
/// Transport details (HTTP, retries, billing audit) are the host's concern;
/// this crate ships only the [`crate::ScriptedClient`] test double.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, req: ChatRequest) -> anyhow::Result<ChatResponse>;
}
