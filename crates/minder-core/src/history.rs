// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use minder_model::Message;
use minder_store::DocumentStore;

/// Collection the append-only conversation log lives in.
pub const HISTORY_COLLECTION: &str = "agent_history";

/// Append-only conversation log with windowed reads.
///
/// Writes never rewrite earlier entries (compaction excepted); reads always
/// return at most `window` of the most recent messages, so a runaway chat
/// cannot grow the prompt without bound even before compaction kicks in.
#[derive(Clone)]
pub struct HistoryLog {
    store: Arc<dyn DocumentStore>,
    window: usize,
}

impl HistoryLog {
    pub fn new(store: Arc<dyn DocumentStore>, window: usize) -> Self {
        Self { store, window }
    }

    /// The most recent `window` messages for a chat, oldest first.
    pub async fn load_recent(&self, chat_id: &str) -> anyhow::Result<Vec<Message>> {
        let docs = self
            .store
            .find(HISTORY_COLLECTION, &json!({ "chat_id": chat_id }), 0)
            .await?;
        let mut entries: Vec<(u64, Message)> = Vec::with_capacity(docs.len());
        for doc in docs {
            let seq = doc.get("seq").and_then(|v| v.as_u64()).unwrap_or(0);
            let Some(raw) = doc.get("message") else { continue };
            let message: Message = serde_json::from_value(raw.clone())?;
            entries.push((seq, message));
        }
        entries.sort_by_key(|(seq, _)| *seq);
        let skip = entries.len().saturating_sub(self.window);
        Ok(entries.into_iter().skip(skip).map(|(_, m)| m).collect())
    }

    /// Append messages in order, assigning consecutive sequence numbers.
    pub async fn append(&self, chat_id: &str, messages: &[Message]) -> anyhow::Result<()> {
        let mut seq = self.next_seq(chat_id).await?;
        for message in messages {
            self.store
                .insert(
                    HISTORY_COLLECTION,
                    json!({
                        "chat_id": chat_id,
                        "seq": seq,
                        "recorded_at": Utc::now(),
                        "message": serde_json::to_value(message)?,
                    }),
                )
                .await?;
            seq += 1;
        }
        Ok(())
    }

    /// Drop the chat's entire log and write `placeholder` as its only entry.
    /// Only compaction calls this; the raw transcript is gone afterwards.
    pub async fn replace_with(&self, chat_id: &str, placeholder: Message) -> anyhow::Result<()> {
        self.store
            .delete_many(HISTORY_COLLECTION, &json!({ "chat_id": chat_id }))
            .await?;
        self.append(chat_id, std::slice::from_ref(&placeholder)).await
    }

    async fn next_seq(&self, chat_id: &str) -> anyhow::Result<u64> {
        let docs = self
            .store
            .find(HISTORY_COLLECTION, &json!({ "chat_id": chat_id }), 0)
            .await?;
        Ok(docs
            .iter()
            .filter_map(|d| d.get("seq").and_then(|v| v.as_u64()))
            .max()
            .map(|m| m + 1)
            .unwrap_or(0))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
