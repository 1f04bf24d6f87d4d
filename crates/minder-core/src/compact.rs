// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use minder_memory::{MemoryStore, NS_SEPARATOR};
use minder_model::{ChatRequest, LlmClient, Message, Role};

use crate::history::HistoryLog;
use crate::profile::AgentProfile;
use crate::session::{SessionManager, SessionPatch};

/// Namespace holding the snapshots of one chat.
pub fn snapshot_namespace(agent_prefix: &str, chat_id: &str) -> String {
    format!("{agent_prefix}{NS_SEPARATOR}snapshots{NS_SEPARATOR}{chat_id}")
}

/// Namespace of the per-agent running snapshot index.
pub fn snapshots_index_namespace(agent_prefix: &str) -> String {
    format!("{agent_prefix}{NS_SEPARATOR}snapshots")
}

/// Filename of the running index inside [`snapshots_index_namespace`].
pub const SNAPSHOT_INDEX_FILE: &str = "index";

// ─── Compaction prompt ────────────────────────────────────────────────────────

/// Fixed instruction for the summarization call.  The markdown shape is part
/// of the contract: the snapshot is re-read verbatim by the prompt assembler
/// and by future compactions, so its sections must stay machine-predictable.
const SNAPSHOT_PROMPT: &str = "\
You are a conversation compaction assistant. Distill the transcript below into \
a state snapshot the agent can resume from. Use EXACTLY the following Markdown \
sections and no others. Be information-dense; preserve names, numbers, file \
names and commitments verbatim where they matter.

## Active Goals
What the user is trying to achieve, one bullet per goal.

## Current Tasks
Concrete work in flight, one bullet per task, with its current state.

## Decisions
Every decision already made, with a short why.

## Observations
Durable facts learned during the conversation (about the user, the data, the \
environment).

## Constraints
Rules, limits and preferences that must keep holding.";

/// Outcome of a compaction request.  `success: false` cases are expected
/// states (nothing to do), not errors; genuine failures propagate as errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactOutcome {
    pub success: bool,
    pub snapshot_id: Option<String>,
    pub message: Option<String>,
}

impl CompactOutcome {
    fn succeeded(snapshot_id: String) -> Self {
        Self { success: true, snapshot_id: Some(snapshot_id), message: None }
    }

    fn skipped(message: &str) -> Self {
        Self { success: false, snapshot_id: None, message: Some(message.to_string()) }
    }
}

/// Summarizes a chat's transcript into a memory snapshot and truncates the
/// persisted history to a single placeholder.
///
/// Deliberately lossy: once a transcript is summarized the raw turns are
/// discarded, which is what keeps conversation state bounded.
pub struct CompactionEngine {
    llm: Arc<dyn LlmClient>,
    memory: Arc<MemoryStore>,
    sessions: SessionManager,
    history: HistoryLog,
}

impl CompactionEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        memory: Arc<MemoryStore>,
        sessions: SessionManager,
        history: HistoryLog,
    ) -> Self {
        Self { llm, memory, sessions, history }
    }

    /// Compact one chat.  Callable manually (admin surface) or automatically
    /// from the conversation loop when the token threshold is crossed.
    pub async fn compact(
        &self,
        agent: &AgentProfile,
        chat_id: &str,
    ) -> anyhow::Result<CompactOutcome> {
        let prefix = agent.namespace();
        let snap_ns = snapshot_namespace(&prefix, chat_id);

        let mut messages = self.history.load_recent(chat_id).await?;
        if messages.is_empty() {
            // No transcript left.  An existing snapshot can still be
            // re-summarized (a no-op improvement pass); otherwise classify
            // why there is nothing to do.
            if let Some(latest) = self.memory.list(&snap_ns).await?.last() {
                let seed = self.memory.read(&snap_ns, &latest.filename).await?;
                messages = vec![Message::system(seed)];
            } else {
                let session = self.sessions.get(chat_id).await?;
                let (has_snapshot, total_tokens) = session
                    .map(|s| (s.last_snapshot_id.is_some(), s.total_tokens))
                    .unwrap_or((false, 0));
                if has_snapshot {
                    return Ok(CompactOutcome::skipped("already compacted"));
                }
                if total_tokens > 0 {
                    return Ok(CompactOutcome::skipped("history expired, start a new session"));
                }
                return Ok(CompactOutcome::skipped("nothing to compact"));
            }
        }

        let snapshot = self.generate_snapshot(agent, &messages).await?;

        let now = Utc::now();
        let filename = format!("{}.md", now.format("%Y%m%d-%H%M%S"));
        let title = format!("Session snapshot {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
        self.memory.write_titled(&snap_ns, &filename, &title, &snapshot).await?;
        self.memory
            .append(
                &snapshots_index_namespace(&prefix),
                SNAPSHOT_INDEX_FILE,
                &format!("{} chat={chat_id} file={filename}", now.to_rfc3339()),
            )
            .await?;

        self.sessions
            .update(
                chat_id,
                SessionPatch {
                    last_snapshot_id: Some(filename.clone()),
                    total_tokens: Some(0),
                    ..Default::default()
                },
            )
            .await?;

        let placeholder = Message::assistant(format!(
            "[Conversation compacted at {}. Earlier turns were summarized into \
             memory snapshot {filename} and discarded.]",
            now.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        self.history.replace_with(chat_id, placeholder).await?;

        info!(chat_id, snapshot = %filename, "session compacted");
        Ok(CompactOutcome::succeeded(filename))
    }

    /// One summarization call over the serialized transcript.  Failures
    /// propagate unchanged; the caller decides whether to retry.
    async fn generate_snapshot(
        &self,
        agent: &AgentProfile,
        messages: &[Message],
    ) -> anyhow::Result<String> {
        let transcript = serialize_history(messages);
        let response = self
            .llm
            .complete(ChatRequest {
                provider_key: agent.provider_key.clone(),
                model: agent.model.clone(),
                messages: vec![Message::system(SNAPSHOT_PROMPT), Message::user(transcript)],
                tools: vec![],
                temperature: agent.temperature,
            })
            .await?;
        Ok(response.content)
    }
}

/// Serialize a message list into plain text for the compaction prompt.
pub(crate) fn serialize_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::Tool => "Tool",
            };
            let mut text = if m.role == Role::Tool {
                format!("[tool_result: {}]", m.content)
            } else {
                m.content.clone()
            };
            if let Some(calls) = &m.tool_calls {
                for c in calls {
                    text.push_str(&format!("\n[tool_call: {}({})]", c.name, c.arguments));
                }
            }
            format!("{role}: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
