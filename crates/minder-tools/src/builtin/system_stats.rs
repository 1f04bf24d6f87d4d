// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::{ErrorCode, ToolError};
use crate::tool::{Tool, ToolCall, ToolContext};

/// Discovery tool: document counts for every registered model.
pub struct SystemStatsTool;

#[async_trait]
impl Tool for SystemStatsTool {
    fn name(&self) -> &str {
        "get_system_stats"
    }

    fn description(&self) -> &str {
        "Return the registered models and their document counts.\n\
         Use this to discover what query_database and raw_db_query can address."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "additionalProperties": false })
    }

    async fn execute(&self, _call: &ToolCall, ctx: &ToolContext) -> String {
        let names = match ctx.store.collection_names().await {
            Ok(n) => n,
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
        let mut counts = Map::new();
        let mut total = 0u64;
        for name in names {
            let n = ctx.store.count(&name, &json!({})).await.unwrap_or(0);
            total += n;
            counts.insert(name, json!(n));
        }
        json!({ "models": counts, "total_documents": total }).to_string()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
