// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use minder_memory::sanitize_name;
use minder_store::DocumentStore;

use crate::error::AgentError;

/// Collection the (externally managed, read-only) agent definitions live in.
pub const AGENTS_COLLECTION: &str = "agents";

fn default_max_iterations() -> u32 {
    8
}

/// An agent definition as the admin surface stores it.
///
/// The runtime never writes these; it resolves them by name per call so
/// out-of-band edits take effect on the next message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    /// Literal persona text, or an indirection of the form
    /// `markdown:<category>/<path>` resolved by the prompt assembler.
    #[serde(default)]
    pub system_prompt: String,
    pub provider_key: String,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl AgentProfile {
    /// The agent's root memory namespace.
    pub fn namespace(&self) -> String {
        sanitize_name(&self.name)
    }

    /// Resolve a profile from the document store by agent name.
    pub async fn resolve(store: &dyn DocumentStore, agent_id: &str) -> anyhow::Result<Self> {
        let doc = store
            .find_one(AGENTS_COLLECTION, &serde_json::json!({ "name": agent_id }))
            .await?
            .ok_or_else(|| AgentError::AgentNotFound(agent_id.to_string()))?;
        Ok(serde_json::from_value(doc)?)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use minder_store::MemDocumentStore;

    use super::*;

    #[tokio::test]
    async fn resolves_profile_by_name() {
        let store = Arc::new(MemDocumentStore::new());
        store
            .insert(
                AGENTS_COLLECTION,
                json!({
                    "name": "Atlas",
                    "system_prompt": "You are Atlas.",
                    "provider_key": "openai",
                    "model": "gpt-4o",
                    "max_iterations": 4
                }),
            )
            .await
            .unwrap();
        let agent = AgentProfile::resolve(store.as_ref(), "Atlas").await.unwrap();
        assert_eq!(agent.model, "gpt-4o");
        assert_eq!(agent.max_iterations, 4);
        assert_eq!(agent.namespace(), "atlas");
    }

    #[tokio::test]
    async fn missing_agent_is_an_error() {
        let store = MemDocumentStore::new();
        let err = AgentProfile::resolve(&store, "ghost").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn max_iterations_defaults_when_absent() {
        let store = Arc::new(MemDocumentStore::new());
        store
            .insert(
                AGENTS_COLLECTION,
                json!({ "name": "A", "provider_key": "mock", "model": "m" }),
            )
            .await
            .unwrap();
        let agent = AgentProfile::resolve(store.as_ref(), "A").await.unwrap();
        assert_eq!(agent.max_iterations, 8);
        assert!(agent.temperature.is_none());
    }
}
