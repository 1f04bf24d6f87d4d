// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use minder_store::ConfigStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Archived,
}

/// Per-conversation metadata, persisted as one JSON record per chat id.
///
/// Sessions are created lazily on the first message of a chat and never
/// deleted; starting a "new" conversation just mints a fresh chat id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub chat_id: String,
    pub agent_id: String,
    pub status: SessionStatus,
    pub last_snapshot_id: Option<String>,
    pub total_tokens: u64,
    #[serde(default)]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied by [`SessionManager::update`].  `None` fields are
/// left untouched; `last_snapshot_id` is only ever set, never cleared.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub last_snapshot_id: Option<String>,
    pub total_tokens: Option<u64>,
    pub label: Option<String>,
}

/// Outcome of [`SessionManager::rename`] — a non-throwing result because a
/// bad label is an expected caller mistake, not a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameResult {
    pub success: bool,
    pub label: Option<String>,
    pub message: Option<String>,
}

/// Lazily-creating store of [`SessionRecord`]s.
#[derive(Clone)]
pub struct SessionManager {
    config: Arc<dyn ConfigStore>,
}

impl SessionManager {
    pub fn new(config: Arc<dyn ConfigStore>) -> Self {
        Self { config }
    }

    /// Deterministic storage slug for a chat id.
    fn slug(chat_id: &str) -> String {
        let safe: String = chat_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        format!("session-{safe}")
    }

    pub async fn get(&self, chat_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        match self.config.get(&Self::slug(chat_id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Fetch the session for `chat_id`, creating a fresh active record when
    /// none exists yet.
    pub async fn get_or_create(
        &self,
        agent_id: &str,
        chat_id: &str,
    ) -> anyhow::Result<SessionRecord> {
        if let Some(existing) = self.get(chat_id).await? {
            return Ok(existing);
        }
        let now = Utc::now();
        let record = SessionRecord {
            chat_id: chat_id.to_string(),
            agent_id: agent_id.to_string(),
            status: SessionStatus::Active,
            last_snapshot_id: None,
            total_tokens: 0,
            label: None,
            created_at: now,
            updated_at: now,
        };
        self.persist(&record).await?;
        debug!(chat_id, agent_id, "session created");
        Ok(record)
    }

    /// Merge `patch` into an existing record and stamp `updated_at`.
    ///
    /// A missing record makes this a silent no-op: the caller may be racing
    /// a chat id that was never used, and there is nothing meaningful to
    /// patch.
    pub async fn update(&self, chat_id: &str, patch: SessionPatch) -> anyhow::Result<()> {
        let Some(mut record) = self.get(chat_id).await? else {
            return Ok(());
        };
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(snapshot) = patch.last_snapshot_id {
            record.last_snapshot_id = Some(snapshot);
        }
        if let Some(tokens) = patch.total_tokens {
            record.total_tokens = tokens;
        }
        if let Some(label) = patch.label {
            record.label = Some(label);
        }
        record.updated_at = Utc::now();
        self.persist(&record).await
    }

    /// Give the session a human-readable label.
    pub async fn rename(&self, chat_id: &str, label: &str) -> anyhow::Result<RenameResult> {
        let label = label.trim();
        if label.is_empty() {
            return Ok(RenameResult {
                success: false,
                label: None,
                message: Some("label must not be blank".into()),
            });
        }
        if self.get(chat_id).await?.is_none() {
            return Ok(RenameResult {
                success: false,
                label: None,
                message: Some(format!("no session for chat '{chat_id}'")),
            });
        }
        self.update(chat_id, SessionPatch { label: Some(label.to_string()), ..Default::default() })
            .await?;
        Ok(RenameResult { success: true, label: Some(label.to_string()), message: None })
    }

    async fn persist(&self, record: &SessionRecord) -> anyhow::Result<()> {
        self.config
            .set(&Self::slug(&record.chat_id), serde_json::to_value(record)?)
            .await?;
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use minder_store::MemConfigStore;

    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemConfigStore::new()))
    }

    // ── get_or_create ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn creates_fresh_active_session() {
        let m = manager();
        let s = m.get_or_create("atlas", "chat-1").await.unwrap();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.total_tokens, 0);
        assert!(s.last_snapshot_id.is_none());
        assert!(s.label.is_none());
    }

    #[tokio::test]
    async fn second_call_returns_existing_record() {
        let m = manager();
        m.get_or_create("atlas", "chat-1").await.unwrap();
        m.update("chat-1", SessionPatch { total_tokens: Some(9), ..Default::default() })
            .await
            .unwrap();
        let again = m.get_or_create("atlas", "chat-1").await.unwrap();
        assert_eq!(again.total_tokens, 9, "existing record must not be reset");
    }

    // ── update ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn update_merges_only_set_fields() {
        let m = manager();
        m.get_or_create("atlas", "chat-1").await.unwrap();
        m.update(
            "chat-1",
            SessionPatch { last_snapshot_id: Some("snap-1".into()), ..Default::default() },
        )
        .await
        .unwrap();
        let s = m.get("chat-1").await.unwrap().unwrap();
        assert_eq!(s.last_snapshot_id.as_deref(), Some("snap-1"));
        assert_eq!(s.total_tokens, 0, "unset patch fields must stay untouched");
    }

    #[tokio::test]
    async fn update_stamps_updated_at() {
        let m = manager();
        let created = m.get_or_create("atlas", "chat-1").await.unwrap();
        m.update("chat-1", SessionPatch { total_tokens: Some(1), ..Default::default() })
            .await
            .unwrap();
        let s = m.get("chat-1").await.unwrap().unwrap();
        assert!(s.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn update_on_missing_session_is_silent_noop() {
        let m = manager();
        m.update("ghost", SessionPatch { total_tokens: Some(5), ..Default::default() })
            .await
            .unwrap();
        assert!(m.get("ghost").await.unwrap().is_none());
    }

    // ── rename ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn rename_blank_label_fails_without_error() {
        let m = manager();
        m.get_or_create("atlas", "chat-1").await.unwrap();
        let r = m.rename("chat-1", "   ").await.unwrap();
        assert!(!r.success);
        assert!(r.message.unwrap().contains("blank"));
    }

    #[tokio::test]
    async fn rename_missing_session_fails_without_error() {
        let m = manager();
        let r = m.rename("ghost", "My chat").await.unwrap();
        assert!(!r.success);
    }

    #[tokio::test]
    async fn rename_persists_trimmed_label() {
        let m = manager();
        m.get_or_create("atlas", "chat-1").await.unwrap();
        let r = m.rename("chat-1", "  Billing questions  ").await.unwrap();
        assert!(r.success);
        assert_eq!(r.label.as_deref(), Some("Billing questions"));
        let s = m.get("chat-1").await.unwrap().unwrap();
        assert_eq!(s.label.as_deref(), Some("Billing questions"));
    }

    // ── slug derivation ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn odd_chat_ids_still_round_trip() {
        let m = manager();
        m.get_or_create("atlas", "tg:12345/67").await.unwrap();
        assert!(m.get("tg:12345/67").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn works_against_the_file_backed_config_store() {
        // The slug must also be filesystem-safe, since the JSON-directory
        // backend uses it as a file stem.
        let dir = tempfile::tempdir().unwrap();
        let m = SessionManager::new(Arc::new(minder_store::JsonDirConfigStore::new(dir.path())));
        m.get_or_create("atlas", "tg:12345/67").await.unwrap();
        let s = m.get("tg:12345/67").await.unwrap().unwrap();
        assert_eq!(s.chat_id, "tg:12345/67");
    }
}
