// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use minder_memory::{resolve_namespace, MemoryError};

use crate::error::{ErrorCode, ToolError};
use crate::tool::{Tool, ToolCall, ToolContext};

/// Thin proxy onto the agent's memory namespace.
///
/// The namespace is taken from the execution context, never from the model,
/// so an agent can only ever touch its own files (plus subfolders it names
/// through `folder`).
pub struct MemoryTool;

fn memory_error(op: &str, err: MemoryError) -> String {
    match err {
        MemoryError::NotFound { namespace, filename } => ToolError::new(
            ErrorCode::NotFound,
            "memory_file_not_found",
            format!("no memory file '{filename}' in '{namespace}'"),
        )
        .recoverable(true)
        .suggest("use action=list to see which files exist")
        .render(),
        other => ToolError::new(
            ErrorCode::InternalError,
            "memory_store_failed",
            format!("memory {op} failed: {other}"),
        )
        .render(),
    }
}

fn require_str<'a>(call: &'a ToolCall, param: &str) -> Result<&'a str, String> {
    call.args
        .get(param)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::missing_required(param).render())
}

#[async_trait]
impl Tool for MemoryTool {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "Read and maintain your persistent memory files.\n\
         Actions: list (show files), read (file), write (file + content, replaces),\n\
         append (file + content, adds a line), search (query across all your folders).\n\
         Use 'folder' to address a subfolder of your namespace; omit it for the root."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["list", "read", "write", "append", "search"],
                    "description": "Operation to perform"
                },
                "file": { "type": "string", "description": "Target filename, e.g. goals.md" },
                "folder": { "type": "string", "description": "Optional subfolder of your namespace" },
                "content": { "type": "string", "description": "Content for write/append" },
                "query": { "type": "string", "description": "Search text for action=search" }
            },
            "required": ["action"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> String {
        let action = match require_str(call, "action") {
            Ok(a) => a,
            Err(envelope) => return envelope,
        };
        let folder = call.args.get("folder").and_then(Value::as_str);
        let namespace = resolve_namespace(&ctx.agent_namespace, folder);

        match action {
            "list" => match ctx.memory.list(&namespace).await {
                Ok(files) => json!({ "namespace": namespace, "files": files }).to_string(),
                Err(e) => memory_error("list", e),
            },
            "read" => {
                let file = match require_str(call, "file") {
                    Ok(f) => f,
                    Err(envelope) => return envelope,
                };
                match ctx.memory.read(&namespace, file).await {
                    Ok(content) => json!({ "file": file, "content": content }).to_string(),
                    Err(e) => memory_error("read", e),
                }
            }
            "write" | "append" => {
                let file = match require_str(call, "file") {
                    Ok(f) => f,
                    Err(envelope) => return envelope,
                };
                let content = match require_str(call, "content") {
                    Ok(c) => c,
                    Err(envelope) => return envelope,
                };
                let result = if action == "write" {
                    ctx.memory.write(&namespace, file, content).await
                } else {
                    ctx.memory.append(&namespace, file, content).await
                };
                match result {
                    Ok(()) => json!({ "ok": true, "action": action, "file": file }).to_string(),
                    Err(e) => memory_error(action, e),
                }
            }
            "search" => {
                let query = match require_str(call, "query") {
                    Ok(q) => q,
                    Err(envelope) => return envelope,
                };
                // Search always spans the whole agent namespace, folders included.
                match ctx.memory.search(&ctx.agent_namespace, query).await {
                    Ok(hits) => json!({ "query": query, "hits": hits }).to_string(),
                    Err(e) => memory_error("search", e),
                }
            }
            other => ToolError::new(
                ErrorCode::InvalidInput,
                "invalid_parameters",
                format!("unknown memory action '{other}'"),
            )
            .recoverable(true)
            .suggest("valid actions: list, read, write, append, search")
            .render(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
