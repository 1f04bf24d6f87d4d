// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info};
use uuid::Uuid;

use minder_memory::MemoryStore;
use minder_model::{
    catalog, ChatRequest, LlmClient, Message, ToolCallRequest, ToolSchema, Usage,
};
use minder_store::{ConfigStore, DocumentStore};
use minder_tools::{
    builtin, is_error_envelope, ErrorCode, ToolCall, ToolContext, ToolError, ToolRegistry,
};

use crate::compact::{CompactOutcome, CompactionEngine};
use crate::config::RuntimeConfig;
use crate::error::{is_abort, AgentError};
use crate::history::HistoryLog;
use crate::profile::AgentProfile;
use crate::prompts::PromptAssembler;
use crate::session::{RenameResult, SessionManager, SessionPatch};

/// Injected on the final permitted iteration, where tool definitions are
/// withheld so the loop terminates regardless of model behavior.
const FINAL_ANSWER_INSTRUCTION: &str = "\
You have used your final tool step. Answer the user now with the information \
you already have. Do not request any tools.";

/// Injected after a tool result that is the structured error envelope.
const ERROR_RECOVERY_INSTRUCTION: &str = "\
The previous tool call failed; its result above is a structured error. \
Explain the problem to the user in friendly natural language and suggest what \
to do next. Never show raw error JSON or internal error codes to the user.";

/// One inbound user message.
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    pub content: String,
    pub sender_id: Option<String>,
    /// Absent on the first message of a conversation; the runtime mints one.
    pub chat_id: Option<String>,
}

/// Per-call options.
#[derive(Debug, Default)]
pub struct TurnOptions {
    /// Cooperative cancellation: polled at the top of every iteration and
    /// before each tool dispatch.  Both an explicit send and a dropped
    /// sender count as an abort.
    pub cancel: Option<oneshot::Receiver<()>>,
}

/// The reply returned to the caller.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub text: String,
    pub usage: Option<Usage>,
    pub chat_id: String,
}

/// Loop state computed once per iteration.
#[derive(Debug, Clone, Copy)]
struct TurnState {
    iteration: u32,
    remaining: u32,
    tools_allowed: bool,
}

impl TurnState {
    fn at(iteration: u32, max_iterations: u32) -> Self {
        let remaining = max_iterations.saturating_sub(iteration);
        Self { iteration, remaining, tools_allowed: remaining > 0 }
    }
}

fn check_abort(cancel: &mut Option<oneshot::Receiver<()>>) -> Result<(), AgentError> {
    let Some(rx) = cancel else {
        return Ok(());
    };
    // Empty means the sender is still alive and silent; anything else
    // (explicit send or dropped sender) is a cancellation.
    match rx.try_recv() {
        Err(oneshot::error::TryRecvError::Empty) => Ok(()),
        _ => Err(AgentError::Aborted),
    }
}

/// The conversation runtime: owns its collaborators and drives the
/// model/tool loop for one agent backend.
///
/// All state lives in the injected stores; the runtime itself only caches
/// the per-chat locks that serialize concurrent turns on one chat id.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn DocumentStore>,
    memory: Arc<MemoryStore>,
    sessions: SessionManager,
    history: HistoryLog,
    prompts: PromptAssembler,
    compaction: CompactionEngine,
    tools: Arc<ToolRegistry>,
    config: RuntimeConfig,
    chat_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AgentRuntime {
    /// Wire up a runtime from its collaborator seams.  The built-in tool set
    /// is registered automatically.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn DocumentStore>,
        config_store: Arc<dyn ConfigStore>,
        config: RuntimeConfig,
    ) -> Self {
        let memory = Arc::new(MemoryStore::new(store.clone()));
        let sessions = SessionManager::new(config_store);
        let history = HistoryLog::new(store.clone(), config.history_window);
        let prompts = PromptAssembler::new(store.clone(), memory.clone());
        let compaction =
            CompactionEngine::new(llm.clone(), memory.clone(), sessions.clone(), history.clone());
        let mut registry = ToolRegistry::new();
        builtin::register_builtins(&mut registry);
        Self {
            llm,
            store,
            memory,
            sessions,
            history,
            prompts,
            compaction,
            tools: Arc::new(registry),
            config,
            chat_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Process one user message through the bounded tool-calling loop.
    ///
    /// The only two error classes that reach the caller are the
    /// distinguished cancellation ("Operation aborted") and genuine
    /// unexpected failures; the latter are logged here, cancellations are
    /// not (the caller initiated them).
    pub async fn process_message(
        &self,
        agent_id: &str,
        msg: IncomingMessage,
        opts: TurnOptions,
    ) -> anyhow::Result<TurnReply> {
        match self.process_inner(agent_id, msg, opts).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if !is_abort(&e) {
                    error!(agent = agent_id, error = %e, "message processing failed");
                }
                Err(e)
            }
        }
    }

    async fn process_inner(
        &self,
        agent_id: &str,
        msg: IncomingMessage,
        opts: TurnOptions,
    ) -> anyhow::Result<TurnReply> {
        let chat_id = msg.chat_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        // Serialize concurrent turns per chat id for the whole call,
        // inline compaction included.
        let _turn_guard = self.chat_lock(&chat_id).lock_owned().await;

        let agent = AgentProfile::resolve(self.store.as_ref(), agent_id).await?;
        let namespace = agent.namespace();
        debug!(
            agent = agent_id,
            chat = %chat_id,
            sender = msg.sender_id.as_deref().unwrap_or("-"),
            "processing message"
        );

        self.memory.ensure_bootstrap(&namespace).await?;
        let mut session = self.sessions.get_or_create(agent_id, &chat_id).await?;
        let context_window = catalog::context_window(
            &agent.provider_key,
            &agent.model,
            self.config.default_context_window,
        );

        let system_prompt = self.prompts.build_system_prompt(&agent, &chat_id).await?;
        let mut messages = vec![Message::system(system_prompt)];
        messages.extend(self.history.load_recent(&chat_id).await?);
        let user = Message::user(&msg.content);
        messages.push(user.clone());
        // Only messages produced by this call are persisted at the end;
        // everything loaded above is already in the log.
        let mut new_messages = vec![user];

        let ctx = ToolContext {
            agent_namespace: namespace,
            chat_id: chat_id.clone(),
            memory: self.memory.clone(),
            store: self.store.clone(),
        };
        let mut cancel = opts.cancel;
        let max_iterations = agent.max_iterations.max(1);
        let mut final_text = String::new();
        let mut last_usage: Option<Usage> = None;

        for iteration in 1..=max_iterations {
            check_abort(&mut cancel)?;
            let turn = TurnState::at(iteration, max_iterations);
            debug!(
                iteration = turn.iteration,
                remaining = turn.remaining,
                tools_allowed = turn.tools_allowed,
                "model call"
            );

            let mut call_messages = messages.clone();
            if !turn.tools_allowed {
                call_messages.push(Message::system(FINAL_ANSWER_INSTRUCTION));
            }
            let tools = if turn.tools_allowed { self.model_schemas() } else { Vec::new() };

            let response = self
                .llm
                .complete(ChatRequest {
                    provider_key: agent.provider_key.clone(),
                    model: agent.model.clone(),
                    messages: call_messages,
                    tools,
                    temperature: agent.temperature,
                })
                .await?;
            if response.usage.is_some() {
                last_usage = response.usage;
            }

            if response.has_tool_calls() && turn.tools_allowed {
                let assistant = Message::assistant_with_calls(
                    response.content.clone(),
                    response.tool_calls.clone(),
                );
                messages.push(assistant.clone());
                new_messages.push(assistant);

                // Strictly in order, one at a time: a later call may depend
                // on memory state written by an earlier one in the same turn.
                for request in &response.tool_calls {
                    check_abort(&mut cancel)?;
                    let result = self.dispatch_tool(request, &ctx).await;
                    let failed = is_error_envelope(&result);
                    let tool_msg = Message::tool_result(&request.id, result);
                    messages.push(tool_msg.clone());
                    new_messages.push(tool_msg);
                    if failed {
                        let nudge = Message::system(ERROR_RECOVERY_INSTRUCTION);
                        messages.push(nudge.clone());
                        new_messages.push(nudge);
                    }
                }
                continue;
            }

            final_text = response.content.clone();
            let assistant = Message::assistant(response.content);
            messages.push(assistant.clone());
            new_messages.push(assistant);
            break;
        }

        if let Some(usage) = last_usage {
            session.total_tokens += u64::from(usage.total_tokens);
            self.sessions
                .update(
                    &chat_id,
                    SessionPatch {
                        total_tokens: Some(session.total_tokens),
                        ..Default::default()
                    },
                )
                .await?;
            let fraction = session.total_tokens as f64 / f64::from(context_window.max(1));
            if fraction > f64::from(self.config.compaction_threshold) {
                info!(
                    chat = %chat_id,
                    tokens = session.total_tokens,
                    context_window,
                    "token threshold crossed, compacting inline"
                );
                self.compaction.compact(&agent, &chat_id).await?;
            }
        }

        self.history.append(&chat_id, &new_messages).await?;
        Ok(TurnReply { text: final_text, usage: last_usage, chat_id })
    }

    /// Parse the call's arguments-as-text once, then hand off to the
    /// registry.  Unparseable arguments become a recoverable envelope
    /// without touching the tool.
    async fn dispatch_tool(&self, request: &ToolCallRequest, ctx: &ToolContext) -> String {
        let parsed = if request.arguments.trim().is_empty() {
            Ok(serde_json::json!({}))
        } else {
            serde_json::from_str::<serde_json::Value>(&request.arguments)
        };
        match parsed {
            Ok(args) => {
                let call =
                    ToolCall { id: request.id.clone(), name: request.name.clone(), args };
                self.tools.execute(&call, ctx).await
            }
            Err(e) => ToolError::new(
                ErrorCode::InvalidInput,
                "invalid_parameters",
                format!("tool arguments are not valid JSON: {e}"),
            )
            .recoverable(true)
            .render(),
        }
    }

    /// Manually compact one chat (same engine the loop triggers inline).
    pub async fn compact_session(
        &self,
        agent_id: &str,
        chat_id: &str,
    ) -> anyhow::Result<CompactOutcome> {
        let _guard = self.chat_lock(chat_id).lock_owned().await;
        let agent = AgentProfile::resolve(self.store.as_ref(), agent_id).await?;
        self.compaction.compact(&agent, chat_id).await
    }

    /// Give a session a human-readable label.
    pub async fn rename_session(
        &self,
        chat_id: &str,
        label: &str,
    ) -> anyhow::Result<RenameResult> {
        self.sessions.rename(chat_id, label).await
    }

    /// Diagnostic: the exact system prompt a turn would be assembled with.
    pub async fn build_system_prompt(
        &self,
        agent_id: &str,
        chat_id: &str,
    ) -> anyhow::Result<String> {
        let agent = AgentProfile::resolve(self.store.as_ref(), agent_id).await?;
        self.prompts.build_system_prompt(&agent, chat_id).await
    }

    fn model_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .schemas()
            .into_iter()
            .map(|s| ToolSchema {
                name: s.name,
                description: s.description,
                parameters: s.parameters,
            })
            .collect()
    }

    fn chat_lock(&self, chat_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.chat_locks.lock().expect("chat lock map is never poisoned");
        locks.entry(chat_id.to_string()).or_default().clone()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
