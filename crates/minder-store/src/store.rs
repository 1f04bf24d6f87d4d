// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::Value;

/// Errors surfaced by store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported store operation: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Explicit acknowledgment returned by every write.
///
/// `bytes` is the serialized length of the document as the store persisted
/// it; callers that need durability verification compare it against their own
/// serialization of the same document rather than issuing a read-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAck {
    /// Store-assigned document id.
    pub id: String,
    /// Monotonically increasing per-document revision (1 on first write).
    pub version: u64,
    /// Serialized byte length of the persisted document.
    pub bytes: usize,
}

/// The document store the runtime reads and writes.
///
/// Filters are JSON objects matched by top-level field equality; an empty
/// filter matches every document.  Collections spring into existence on
/// first insert.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, filter: &Value, limit: usize) -> Result<Vec<Value>>;

    async fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Value>>;

    async fn count(&self, collection: &str, filter: &Value) -> Result<u64>;

    /// Unique values of `field` across documents matching `filter`,
    /// in first-seen order.
    async fn distinct(&self, collection: &str, field: &str, filter: &Value) -> Result<Vec<Value>>;

    async fn insert(&self, collection: &str, doc: Value) -> Result<WriteAck>;

    /// Update the first document matching `filter` in place, or insert `doc`
    /// when nothing matches.
    async fn upsert(&self, collection: &str, filter: &Value, doc: Value) -> Result<WriteAck>;

    /// Delete every document matching `filter`; returns the removed count.
    async fn delete_many(&self, collection: &str, filter: &Value) -> Result<u64>;

    async fn collection_names(&self) -> Result<Vec<String>>;

    async fn database_names(&self) -> Result<Vec<String>>;

    /// A restricted aggregation pipeline (`$match`, `$limit`, `$count`).
    async fn aggregate(&self, collection: &str, pipeline: &[Value]) -> Result<Vec<Value>>;

    /// Low-level administrative command (`ping`, `buildInfo`, `listDatabases`).
    async fn admin_command(&self, cmd: &Value) -> Result<Value>;
}

/// Slug-addressed JSON configuration records (session metadata lives here).
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, slug: &str) -> Result<Option<Value>>;

    async fn set(&self, slug: &str, value: Value) -> Result<()>;
}

/// Top-level field-equality match used by the in-memory backend and reusable
/// by other implementations.
pub fn matches_filter(doc: &Value, filter: &Value) -> bool {
    let Some(obj) = filter.as_object() else {
        return true;
    };
    obj.iter().all(|(k, v)| doc.get(k) == Some(v))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches_filter(&json!({"a": 1}), &json!({})));
    }

    #[test]
    fn filter_requires_all_fields_to_match() {
        let doc = json!({"a": 1, "b": "x"});
        assert!(matches_filter(&doc, &json!({"a": 1})));
        assert!(matches_filter(&doc, &json!({"a": 1, "b": "x"})));
        assert!(!matches_filter(&doc, &json!({"a": 1, "b": "y"})));
        assert!(!matches_filter(&doc, &json!({"c": true})));
    }

    #[test]
    fn non_object_filter_matches_everything() {
        assert!(matches_filter(&json!({"a": 1}), &json!(null)));
    }
}
