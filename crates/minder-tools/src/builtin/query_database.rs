// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::args::JsonArg;
use crate::error::{ErrorCode, ToolError};
use crate::tool::{Tool, ToolCall, ToolContext};

const DEFAULT_LIMIT: usize = 5;

/// Generic lookup against a registered model (collection) by filter.
pub struct QueryDatabaseTool;

#[async_trait]
impl Tool for QueryDatabaseTool {
    fn name(&self) -> &str {
        "query_database"
    }

    fn description(&self) -> &str {
        "Look up documents of a registered model by a field-equality filter.\n\
         Returns up to 'limit' matching documents (default 5).\n\
         Use get_system_stats first to discover which models exist."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "model": { "type": "string", "description": "Model (collection) name" },
                "filter": {
                    "description": "Field-equality filter object, or a JSON-encoded string of one"
                },
                "limit": { "type": "integer", "description": "Maximum documents to return (default 5)" }
            },
            "required": ["model"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> String {
        let model = match call.args.get("model").and_then(Value::as_str) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => return ToolError::missing_required("model").render(),
        };
        let filter = match call.args.get("filter").cloned() {
            None | Some(Value::Null) => json!({}),
            Some(v) => match JsonArg::from(v).normalize() {
                Ok(f) => f,
                Err(e) => {
                    return ToolError::new(
                        ErrorCode::InvalidInput,
                        "query_execution_failed",
                        format!("filter is not valid JSON: {e}"),
                    )
                    .recoverable(true)
                    .suggest("pass filter as an object, e.g. {\"status\": \"active\"}")
                    .render()
                }
            },
        };
        let limit = call
            .args
            .get("limit")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_LIMIT);

        let known = match ctx.store.collection_names().await {
            Ok(names) => names,
            Err(e) => {
                return ToolError::new(
                    ErrorCode::ServiceUnavailable,
                    "query_execution_failed",
                    format!("store unavailable: {e}"),
                )
                .recoverable(true)
                .render()
            }
        };
        if !known.iter().any(|n| n == &model) {
            return ToolError::new(
                ErrorCode::NotFound,
                "model_not_found",
                format!("no model named '{model}' is registered"),
            )
            .recoverable(true)
            .suggest("call get_system_stats to list the available models")
            .render();
        }

        match ctx.store.find(&model, &filter, limit).await {
            Ok(docs) => {
                json!({ "model": model, "count": docs.len(), "documents": docs }).to_string()
            }
            Err(e) => ToolError::new(
                ErrorCode::InternalError,
                "query_execution_failed",
                format!("query against '{model}' failed: {e}"),
            )
            .recoverable(true)
            .render(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use minder_memory::MemoryStore;
    use minder_store::{DocumentStore, MemDocumentStore};

    use super::*;
    use crate::error::is_error_envelope;

    async fn ctx() -> ToolContext {
        let store = Arc::new(MemDocumentStore::new());
        for i in 0..8 {
            store
                .insert("articles", json!({"title": format!("a{i}"), "status": "published"}))
                .await
                .unwrap();
        }
        ToolContext {
            agent_namespace: "atlas".into(),
            chat_id: "chat-1".into(),
            memory: Arc::new(MemoryStore::new(store.clone())),
            store,
        }
    }

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "1".into(), name: "query_database".into(), args }
    }

    #[tokio::test]
    async fn default_limit_is_five() {
        let t = QueryDatabaseTool;
        let out = t.execute(&call(json!({"model": "articles"})), &ctx().await).await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["count"], 5);
    }

    #[tokio::test]
    async fn filter_accepted_as_json_string() {
        let t = QueryDatabaseTool;
        let out = t
            .execute(
                &call(json!({"model": "articles", "filter": "{\"title\":\"a3\"}"})),
                &ctx().await,
            )
            .await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["count"], 1);
    }

    #[tokio::test]
    async fn unknown_model_is_not_found_with_discovery_hint() {
        let t = QueryDatabaseTool;
        let out = t.execute(&call(json!({"model": "ghosts"})), &ctx().await).await;
        assert!(is_error_envelope(&out));
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["error"]["code"], "NOT_FOUND");
        assert!(v["error"]["suggestions"][0].as_str().unwrap().contains("get_system_stats"));
    }

    #[tokio::test]
    async fn malformed_filter_string_is_recoverable_error() {
        let t = QueryDatabaseTool;
        let out = t
            .execute(&call(json!({"model": "articles", "filter": "{broken"})), &ctx().await)
            .await;
        assert!(is_error_envelope(&out));
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["error"]["recoverable"], true);
    }
}
