use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use minder_memory::MemoryStore;
use minder_store::DocumentStore;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier returned by the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: Value,
}

/// Collaborators a tool executes against, injected at construction time by
/// the runtime.  Tools never resolve services on their own.
#[derive(Clone)]
pub struct ToolContext {
    /// Root memory namespace of the calling agent; the memory tool scopes
    /// every operation to it.
    pub agent_namespace: String,
    pub chat_id: String,
    pub memory: Arc<MemoryStore>,
    pub store: Arc<dyn DocumentStore>,
}

/// A tool schema – mirrors minder_model::ToolSchema but keeps the tools
/// crate independent from the model crate.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Trait that every built-in tool implements.
///
/// `execute` always returns a string: success payloads are free-form
/// JSON-in-text, failures are the structured envelope from [`crate::ToolError`].
/// Failures never propagate as Rust errors.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> String;
}
