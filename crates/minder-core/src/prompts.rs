// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use minder_memory::MemoryStore;
use minder_store::DocumentStore;

use crate::compact::snapshot_namespace;
use crate::profile::AgentProfile;

/// Collection holding CMS-managed documents (rules, personas).
pub const DOCUMENTS_COLLECTION: &str = "documents";

/// Category of the globally applied rule documents.
pub const RULES_CATEGORY: &str = "rules";

/// Marker a published rule must contain to be injected into every prompt.
const ALWAYS_ON_MARKER: &str = "trigger: always_on";

/// Horizontal rule between concatenated rule documents.
const RULE_SEPARATOR: &str = "\n\n---\n\n";

/// Indirection prefix for personas stored as CMS documents.
const PERSONA_REF_PREFIX: &str = "markdown:";

/// Fallback persona when an agent's prompt reference cannot be resolved.
const DEFAULT_PERSONA: &str = "You are a capable, honest assistant. Answer plainly, \
     use your tools when they help, and say so when you do not know something.";

/// Fixed operating instructions appended to the memory context.
const MEMORY_INSTRUCTIONS: &str = "\
### Using your memory
- Use the `memory` tool to read and maintain the files listed above.
- Read a file before relying on it; record durable facts, goals and decisions \
as soon as you learn them.
- Keep entries short and factual. Append to running logs instead of rewriting them.
- Search your memory before asking the user to repeat something they already told you.";

/// Builds the system prompt from global rules, memory context and persona.
pub struct PromptAssembler {
    store: Arc<dyn DocumentStore>,
    memory: Arc<MemoryStore>,
}

impl PromptAssembler {
    pub fn new(store: Arc<dyn DocumentStore>, memory: Arc<MemoryStore>) -> Self {
        Self { store, memory }
    }

    /// Assemble the full system prompt for one agent and chat.
    ///
    /// Section order is fixed: global rules, memory context, persona; each
    /// section is followed by a blank line.
    pub async fn build_system_prompt(
        &self,
        agent: &AgentProfile,
        chat_id: &str,
    ) -> anyhow::Result<String> {
        let mut sections = Vec::with_capacity(3);
        if let Some(rules) = self.resolve_global_rules().await? {
            sections.push(rules);
        }
        sections.push(self.resolve_memory_context(agent, chat_id).await?);
        sections.push(self.resolve_persona(agent).await);
        Ok(sections.join("\n\n"))
    }

    /// All published rule documents carrying the always-on marker, in
    /// document order, separated by horizontal rules.
    async fn resolve_global_rules(&self) -> anyhow::Result<Option<String>> {
        let filter = json!({ "category": RULES_CATEGORY, "status": "published" });
        let docs = self.store.find(DOCUMENTS_COLLECTION, &filter, 0).await?;
        let rules: Vec<String> = docs
            .iter()
            .filter_map(|d| d.get("content").and_then(|c| c.as_str()))
            .filter(|content| content.contains(ALWAYS_ON_MARKER))
            .map(str::to_string)
            .collect();
        if rules.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rules.join(RULE_SEPARATOR)))
        }
    }

    /// Memory overview: root files, subfolders, the current session snapshot
    /// (verbatim, when one exists) and the fixed operating instructions.
    async fn resolve_memory_context(
        &self,
        agent: &AgentProfile,
        chat_id: &str,
    ) -> anyhow::Result<String> {
        let namespace = agent.namespace();
        let mut out = String::from("## Memory\n");
        out.push_str(&format!("Files in `{namespace}`:\n"));
        for entry in self.memory.list(&namespace).await? {
            out.push_str(&format!("- {} ({})\n", entry.filename, entry.title));
        }
        let subfolders = self.memory.subfolders(&namespace).await?;
        if !subfolders.is_empty() {
            out.push_str(&format!("Subfolders: {}\n", subfolders.join(", ")));
        }

        let snap_ns = snapshot_namespace(&namespace, chat_id);
        if let Some(latest) = self.memory.list(&snap_ns).await?.last() {
            match self.memory.read(&snap_ns, &latest.filename).await {
                Ok(content) => {
                    out.push_str("\n### Current session snapshot\n");
                    out.push_str(&content);
                    out.push('\n');
                }
                Err(e) => warn!(chat_id, error = %e, "session snapshot listed but unreadable"),
            }
        }

        out.push('\n');
        out.push_str(MEMORY_INSTRUCTIONS);
        Ok(out)
    }

    /// The agent's persona: literal prompt text, or a `markdown:` reference
    /// into the documents collection.  Any resolution failure falls back to
    /// the generic default persona.
    async fn resolve_persona(&self, agent: &AgentProfile) -> String {
        let raw = agent.system_prompt.trim();
        if raw.is_empty() {
            return DEFAULT_PERSONA.to_string();
        }
        let Some(reference) = raw.strip_prefix(PERSONA_REF_PREFIX) else {
            return raw.to_string();
        };
        let Some((category, path)) = reference.split_once('/') else {
            warn!(reference, "malformed persona reference");
            return DEFAULT_PERSONA.to_string();
        };
        let filter = json!({ "category": category, "path": path });
        match self.store.find_one(DOCUMENTS_COLLECTION, &filter).await {
            Ok(Some(doc)) => match doc.get("content").and_then(|c| c.as_str()) {
                Some(content) if !content.trim().is_empty() => content.to_string(),
                _ => DEFAULT_PERSONA.to_string(),
            },
            Ok(None) => {
                warn!(reference, "persona document not found, using default");
                DEFAULT_PERSONA.to_string()
            }
            Err(e) => {
                warn!(reference, error = %e, "persona lookup failed, using default");
                DEFAULT_PERSONA.to_string()
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
