// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{ChatRequest, ChatResponse, LlmClient, ToolCallRequest, Usage};

/// A pre-scripted mock client.  Each call to `complete` pops the next
/// response from the front of the queue.  This lets tests specify exact
/// call sequences – including tool calls and usage totals – without
/// network access.
pub struct ScriptedClient {
    scripts: Arc<Mutex<Vec<ChatResponse>>>,
    /// Every `ChatRequest` seen by this client, in call order.
    /// Written on each `complete()` call so tests can inspect what was sent.
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    /// When set, `complete` fails with this message instead of consuming a
    /// script.  Used to exercise propagation of provider failures.
    fail_with: Option<String>,
}

impl ScriptedClient {
    /// Build a client from an ordered list of responses.
    pub fn new(scripts: Vec<ChatResponse>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
        }
    }

    /// Client whose every call fails with `msg`.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_with: Some(msg.into()),
        }
    }

    /// Convenience: client that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![ChatResponse {
            content: reply.into(),
            tool_calls: vec![],
            usage: Some(Usage { prompt_tokens: 5, completion_tokens: 5, total_tokens: 10 }),
        }])
    }

    /// Convenience: client that returns one tool call, then a text reply.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            // Round 1 – model emits a tool call
            ChatResponse {
                content: String::new(),
                tool_calls: vec![ToolCallRequest {
                    id: tool_id.into(),
                    name: tool_name.into(),
                    arguments: args_json.into(),
                }],
                usage: Some(Usage { prompt_tokens: 5, completion_tokens: 5, total_tokens: 10 }),
            },
            // Round 2 – model responds after the tool result
            ChatResponse {
                content: final_text.into(),
                tool_calls: vec![],
                usage: Some(Usage { prompt_tokens: 8, completion_tokens: 4, total_tokens: 12 }),
            },
        ])
    }

    /// Snapshot of every request seen so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of `complete` calls made against this client.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, req: ChatRequest) -> anyhow::Result<ChatResponse> {
        self.requests.lock().unwrap().push(req);
        if let Some(msg) = &self.fail_with {
            anyhow::bail!("{msg}");
        }
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            // Default fallback when all scripts are consumed
            return Ok(ChatResponse {
                content: "[no more scripts]".into(),
                tool_calls: vec![],
                usage: None,
            });
        }
        Ok(scripts.remove(0))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    fn req() -> ChatRequest {
        ChatRequest {
            provider_key: "mock".into(),
            model: "scripted-mock-model".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn scripted_single_text_reply() {
        let c = ScriptedClient::always_text("hello world");
        let resp = c.complete(req()).await.unwrap();
        assert_eq!(resp.content, "hello world");
        assert!(!resp.has_tool_calls());
    }

    #[tokio::test]
    async fn scripted_tool_then_text_two_rounds() {
        let c = ScriptedClient::tool_then_text("call-1", "exec", r#"{"command":"ls"}"#, "done");

        let first = c.complete(req()).await.unwrap();
        assert!(first.has_tool_calls());
        assert_eq!(first.tool_calls[0].name, "exec");

        let second = c.complete(req()).await.unwrap();
        assert_eq!(second.content, "done");
    }

    #[tokio::test]
    async fn requests_are_recorded_in_order() {
        let c = ScriptedClient::always_text("x");
        c.complete(req()).await.unwrap();
        c.complete(req()).await.unwrap();
        assert_eq!(c.call_count(), 2);
    }

    #[tokio::test]
    async fn fallback_when_scripts_exhausted() {
        let c = ScriptedClient::new(vec![]);
        let resp = c.complete(req()).await.unwrap();
        assert!(resp.content.contains("no more scripts"));
    }

    #[tokio::test]
    async fn failing_client_propagates_message() {
        let c = ScriptedClient::failing("upstream 503");
        let err = c.complete(req()).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
