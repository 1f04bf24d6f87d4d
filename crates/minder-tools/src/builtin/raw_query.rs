// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use minder_store::StoreError;

use crate::args::JsonArg;
use crate::error::{ErrorCode, ToolError};
use crate::tool::{Tool, ToolCall, ToolContext};

/// Low-level store access for diagnostics and discovery.
pub struct RawDbQueryTool;

fn parse_failure(param: &str, e: serde_json::Error) -> String {
    ToolError::new(
        ErrorCode::InvalidInput,
        "query_execution_failed",
        format!("'{param}' is not valid JSON: {e}"),
    )
    .recoverable(true)
    .suggest(format!("pass '{param}' as a JSON object, or as a string containing one"))
    .render()
}

fn store_failure(e: StoreError) -> String {
    match e {
        StoreError::Unsupported(msg) => ToolError::new(
            ErrorCode::InvalidInput,
            "query_execution_failed",
            msg,
        )
        .recoverable(true)
        .render(),
        other => ToolError::new(
            ErrorCode::ServiceUnavailable,
            "query_execution_failed",
            format!("store operation failed: {other}"),
        )
        .recoverable(true)
        .render(),
    }
}

/// Extract an optional object-or-string parameter; `Ok(None)` when absent.
fn optional_json(call: &ToolCall, param: &str) -> Result<Option<Value>, String> {
    match call.args.get(param).cloned() {
        None | Some(Value::Null) => Ok(None),
        Some(v) => JsonArg::from(v)
            .normalize()
            .map(Some)
            .map_err(|e| parse_failure(param, e)),
    }
}

fn require_collection(call: &ToolCall) -> Result<String, String> {
    call.args
        .get("collection")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ToolError::missing_required("collection").render())
}

#[async_trait]
impl Tool for RawDbQueryTool {
    fn name(&self) -> &str {
        "raw_db_query"
    }

    fn description(&self) -> &str {
        "Run a low-level store operation.\n\
         operation: listDatabases | listCollections | countDocuments | findOne |\n\
         aggregate | adminCommand.\n\
         'filter' and 'command' accept an object or a JSON-encoded string.\n\
         countDocuments/findOne/aggregate require 'collection'; aggregate takes\n\
         'pipeline' (array of stages); adminCommand takes 'command'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["listDatabases", "listCollections", "countDocuments",
                             "findOne", "aggregate", "adminCommand"]
                },
                "collection": { "type": "string" },
                "filter": { "description": "Filter object or JSON-encoded string" },
                "pipeline": { "type": "array", "description": "Aggregation stages" },
                "command": { "description": "Admin command object or JSON-encoded string" }
            },
            "required": ["operation"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> String {
        let operation = match call.args.get("operation").and_then(Value::as_str) {
            Some(op) if !op.is_empty() => op,
            _ => return ToolError::missing_required("operation").render(),
        };

        match operation {
            "listDatabases" => match ctx.store.database_names().await {
                Ok(names) => json!({ "databases": names }).to_string(),
                Err(e) => store_failure(e),
            },
            "listCollections" => match ctx.store.collection_names().await {
                Ok(names) => json!({ "collections": names }).to_string(),
                Err(e) => store_failure(e),
            },
            "countDocuments" => {
                let collection = match require_collection(call) {
                    Ok(c) => c,
                    Err(envelope) => return envelope,
                };
                let filter = match optional_json(call, "filter") {
                    Ok(f) => f.unwrap_or_else(|| json!({})),
                    Err(envelope) => return envelope,
                };
                match ctx.store.count(&collection, &filter).await {
                    Ok(n) => json!({ "collection": collection, "count": n }).to_string(),
                    Err(e) => store_failure(e),
                }
            }
            "findOne" => {
                let collection = match require_collection(call) {
                    Ok(c) => c,
                    Err(envelope) => return envelope,
                };
                let filter = match optional_json(call, "filter") {
                    Ok(f) => f.unwrap_or_else(|| json!({})),
                    Err(envelope) => return envelope,
                };
                match ctx.store.find_one(&collection, &filter).await {
                    Ok(doc) => json!({ "collection": collection, "document": doc }).to_string(),
                    Err(e) => store_failure(e),
                }
            }
            "aggregate" => {
                let collection = match require_collection(call) {
                    Ok(c) => c,
                    Err(envelope) => return envelope,
                };
                let pipeline = match call.args.get("pipeline").and_then(Value::as_array) {
                    Some(stages) => stages.clone(),
                    None => return ToolError::missing_required("pipeline").render(),
                };
                match ctx.store.aggregate(&collection, &pipeline).await {
                    Ok(docs) => json!({ "collection": collection, "results": docs }).to_string(),
                    Err(e) => store_failure(e),
                }
            }
            "adminCommand" => {
                let command = match optional_json(call, "command") {
                    Ok(Some(c)) => c,
                    Ok(None) => return ToolError::missing_required("command").render(),
                    Err(envelope) => return envelope,
                };
                match ctx.store.admin_command(&command).await {
                    Ok(result) => result.to_string(),
                    Err(e) => store_failure(e),
                }
            }
            other => ToolError::new(
                ErrorCode::InvalidInput,
                "query_execution_failed",
                format!("unknown operation '{other}'"),
            )
            .recoverable(true)
            .suggest(
                "valid operations: listDatabases, listCollections, countDocuments, \
                 findOne, aggregate, adminCommand",
            )
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
        store.insert("articles", json!({"status": "published"})).await.unwrap();
        store.insert("articles", json!({"status": "draft"})).await.unwrap();
        ToolContext {
            agent_namespace: "atlas".into(),
            chat_id: "chat-1".into(),
            memory: Arc::new(MemoryStore::new(store.clone())),
            store,
        }
    }

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "1".into(), name: "raw_db_query".into(), args }
    }

    #[tokio::test]
    async fn list_collections_names_every_collection() {
        let out = RawDbQueryTool
            .execute(&call(json!({"operation": "listCollections"})), &ctx().await)
            .await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["collections"], json!(["articles"]));
    }

    #[tokio::test]
    async fn count_documents_with_string_filter() {
        let out = RawDbQueryTool
            .execute(
                &call(json!({
                    "operation": "countDocuments",
                    "collection": "articles",
                    "filter": "{\"status\":\"published\"}"
                })),
                &ctx().await,
            )
            .await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["count"], 1);
    }

    #[tokio::test]
    async fn find_one_returns_first_match() {
        let out = RawDbQueryTool
            .execute(
                &call(json!({
                    "operation": "findOne",
                    "collection": "articles",
                    "filter": {"status": "draft"}
                })),
                &ctx().await,
            )
            .await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["document"]["status"], "draft");
    }

    #[tokio::test]
    async fn aggregate_runs_supported_pipeline() {
        let out = RawDbQueryTool
            .execute(
                &call(json!({
                    "operation": "aggregate",
                    "collection": "articles",
                    "pipeline": [{"$match": {"status": "published"}}, {"$count": "n"}]
                })),
                &ctx().await,
            )
            .await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["results"][0]["n"], 1);
    }

    #[tokio::test]
    async fn admin_command_as_string_is_parsed() {
        let out = RawDbQueryTool
            .execute(
                &call(json!({"operation": "adminCommand", "command": "{\"ping\":1}"})),
                &ctx().await,
            )
            .await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["ok"], 1);
    }

    #[tokio::test]
    async fn malformed_filter_is_recoverable_query_error() {
        let out = RawDbQueryTool
            .execute(
                &call(json!({
                    "operation": "countDocuments",
                    "collection": "articles",
                    "filter": "{oops"
                })),
                &ctx().await,
            )
            .await;
        assert!(is_error_envelope(&out));
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["error"]["type"], "query_execution_failed");
        assert_eq!(v["error"]["recoverable"], true);
    }

    #[tokio::test]
    async fn unknown_operation_is_invalid_input() {
        let out = RawDbQueryTool
            .execute(&call(json!({"operation": "dropDatabase"})), &ctx().await)
            .await;
        assert!(is_error_envelope(&out));
        assert!(out.contains("INVALID_INPUT"));
    }
}
