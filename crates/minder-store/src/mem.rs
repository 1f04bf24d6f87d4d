// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::store::{matches_filter, ConfigStore, DocumentStore, Result, StoreError, WriteAck};

#[derive(Debug, Default)]
struct StoredDoc {
    id: String,
    version: u64,
    body: Value,
}

/// In-memory [`DocumentStore`].
///
/// Documents keep insertion order within a collection, so `find` without a
/// narrowing filter returns them oldest-first.  This is the default wiring
/// for tests and single-process deployments; it makes no durability claims.
#[derive(Default)]
pub struct MemDocumentStore {
    collections: RwLock<HashMap<String, Vec<StoredDoc>>>,
    next_id: RwLock<u64>,
}

impl MemDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn mint_id(&self) -> String {
        let mut n = self.next_id.write().await;
        *n += 1;
        format!("doc-{n}")
    }
}

fn ack_for(doc: &StoredDoc) -> Result<WriteAck> {
    Ok(WriteAck {
        id: doc.id.clone(),
        version: doc.version,
        bytes: serde_json::to_vec(&doc.body)?.len(),
    })
}

#[async_trait]
impl DocumentStore for MemDocumentStore {
    async fn find(&self, collection: &str, filter: &Value, limit: usize) -> Result<Vec<Value>> {
        let cols = self.collections.read().await;
        let docs = cols.get(collection).map(Vec::as_slice).unwrap_or(&[]);
        let iter = docs.iter().filter(|d| matches_filter(&d.body, filter));
        let out: Vec<Value> = if limit == 0 {
            iter.map(|d| d.body.clone()).collect()
        } else {
            iter.take(limit).map(|d| d.body.clone()).collect()
        };
        Ok(out)
    }

    async fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Value>> {
        Ok(self.find(collection, filter, 1).await?.into_iter().next())
    }

    async fn count(&self, collection: &str, filter: &Value) -> Result<u64> {
        let cols = self.collections.read().await;
        let docs = cols.get(collection).map(Vec::as_slice).unwrap_or(&[]);
        Ok(docs.iter().filter(|d| matches_filter(&d.body, filter)).count() as u64)
    }

    async fn distinct(&self, collection: &str, field: &str, filter: &Value) -> Result<Vec<Value>> {
        let cols = self.collections.read().await;
        let docs = cols.get(collection).map(Vec::as_slice).unwrap_or(&[]);
        let mut seen = Vec::new();
        for d in docs.iter().filter(|d| matches_filter(&d.body, filter)) {
            if let Some(v) = d.body.get(field) {
                if !seen.contains(v) {
                    seen.push(v.clone());
                }
            }
        }
        Ok(seen)
    }

    async fn insert(&self, collection: &str, doc: Value) -> Result<WriteAck> {
        let id = self.mint_id().await;
        let mut cols = self.collections.write().await;
        let stored = StoredDoc { id, version: 1, body: doc };
        let ack = ack_for(&stored)?;
        cols.entry(collection.to_string()).or_default().push(stored);
        Ok(ack)
    }

    async fn upsert(&self, collection: &str, filter: &Value, doc: Value) -> Result<WriteAck> {
        {
            let mut cols = self.collections.write().await;
            if let Some(docs) = cols.get_mut(collection) {
                if let Some(existing) = docs.iter_mut().find(|d| matches_filter(&d.body, filter)) {
                    existing.version += 1;
                    existing.body = doc;
                    return ack_for(existing);
                }
            }
        }
        self.insert(collection, doc).await
    }

    async fn delete_many(&self, collection: &str, filter: &Value) -> Result<u64> {
        let mut cols = self.collections.write().await;
        let Some(docs) = cols.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !matches_filter(&d.body, filter));
        Ok((before - docs.len()) as u64)
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        let cols = self.collections.read().await;
        let mut names: Vec<String> = cols.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn database_names(&self) -> Result<Vec<String>> {
        Ok(vec!["minder".to_string()])
    }

    async fn aggregate(&self, collection: &str, pipeline: &[Value]) -> Result<Vec<Value>> {
        let mut docs = self.find(collection, &json!({}), 0).await?;
        for stage in pipeline {
            let Some(obj) = stage.as_object() else {
                return Err(StoreError::Unsupported("non-object pipeline stage".into()));
            };
            let (op, arg) = obj
                .iter()
                .next()
                .ok_or_else(|| StoreError::Unsupported("empty pipeline stage".into()))?;
            match op.as_str() {
                "$match" => docs.retain(|d| matches_filter(d, arg)),
                "$limit" => {
                    let n = arg.as_u64().unwrap_or(0) as usize;
                    docs.truncate(n);
                }
                "$count" => {
                    let name = arg.as_str().unwrap_or("count");
                    docs = vec![json!({ name: docs.len() })];
                }
                other => {
                    return Err(StoreError::Unsupported(format!(
                        "aggregation stage {other} is not supported"
                    )))
                }
            }
        }
        Ok(docs)
    }

    async fn admin_command(&self, cmd: &Value) -> Result<Value> {
        let name = cmd
            .as_object()
            .and_then(|o| o.keys().next())
            .cloned()
            .unwrap_or_default();
        match name.as_str() {
            "ping" => Ok(json!({ "ok": 1 })),
            "buildInfo" => Ok(json!({ "ok": 1, "version": "minder-mem-store" })),
            "listDatabases" => Ok(json!({ "ok": 1, "databases": self.database_names().await? })),
            other => Err(StoreError::Unsupported(format!(
                "admin command {other} is not supported"
            ))),
        }
    }
}

/// In-memory [`ConfigStore`] keyed by slug.
#[derive(Default)]
pub struct MemConfigStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemConfigStore {
    async fn get(&self, slug: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(slug).cloned())
    }

    async fn set(&self, slug: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(slug.to_string(), value);
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // ── Document store basics ─────────────────────────────────────────────────

    #[tokio::test]
    async fn insert_then_find_one() {
        let s = MemDocumentStore::new();
        s.insert("things", json!({"name": "a", "n": 1})).await.unwrap();
        let found = s.find_one("things", &json!({"name": "a"})).await.unwrap();
        assert_eq!(found.unwrap()["n"], 1);
    }

    #[tokio::test]
    async fn find_respects_limit_and_order() {
        let s = MemDocumentStore::new();
        for i in 0..5 {
            s.insert("seq", json!({"i": i})).await.unwrap();
        }
        let docs = s.find("seq", &json!({}), 3).await.unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0]["i"], 0, "insertion order must be preserved");
    }

    #[tokio::test]
    async fn find_with_zero_limit_returns_all() {
        let s = MemDocumentStore::new();
        for i in 0..4 {
            s.insert("seq", json!({"i": i})).await.unwrap();
        }
        assert_eq!(s.find("seq", &json!({}), 0).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn count_applies_filter() {
        let s = MemDocumentStore::new();
        s.insert("c", json!({"kind": "x"})).await.unwrap();
        s.insert("c", json!({"kind": "y"})).await.unwrap();
        s.insert("c", json!({"kind": "x"})).await.unwrap();
        assert_eq!(s.count("c", &json!({"kind": "x"})).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn distinct_preserves_first_seen_order() {
        let s = MemDocumentStore::new();
        for ns in ["b", "a", "b", "c"] {
            s.insert("d", json!({"ns": ns})).await.unwrap();
        }
        let values = s.distinct("d", "ns", &json!({})).await.unwrap();
        assert_eq!(values, vec![json!("b"), json!("a"), json!("c")]);
    }

    // ── Write acknowledgments ─────────────────────────────────────────────────

    #[tokio::test]
    async fn insert_ack_reports_serialized_bytes() {
        let s = MemDocumentStore::new();
        let doc = json!({"content": "hello"});
        let expected = serde_json::to_vec(&doc).unwrap().len();
        let ack = s.insert("m", doc).await.unwrap();
        assert_eq!(ack.bytes, expected);
        assert_eq!(ack.version, 1);
    }

    #[tokio::test]
    async fn upsert_bumps_version_on_existing_doc() {
        let s = MemDocumentStore::new();
        let filter = json!({"key": "k"});
        let a1 = s.upsert("m", &filter, json!({"key": "k", "v": 1})).await.unwrap();
        let a2 = s.upsert("m", &filter, json!({"key": "k", "v": 2})).await.unwrap();
        assert_eq!(a1.version, 1);
        assert_eq!(a2.version, 2);
        assert_eq!(a1.id, a2.id, "upsert must keep the document identity");
        assert_eq!(s.count("m", &json!({})).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_inserts_when_nothing_matches() {
        let s = MemDocumentStore::new();
        s.upsert("m", &json!({"key": "none"}), json!({"key": "fresh"})).await.unwrap();
        assert_eq!(s.count("m", &json!({})).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_many_returns_removed_count() {
        let s = MemDocumentStore::new();
        for i in 0..3 {
            s.insert("d", json!({"chat": "c1", "i": i})).await.unwrap();
        }
        s.insert("d", json!({"chat": "c2"})).await.unwrap();
        assert_eq!(s.delete_many("d", &json!({"chat": "c1"})).await.unwrap(), 3);
        assert_eq!(s.count("d", &json!({})).await.unwrap(), 1);
    }

    // ── Discovery surface ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn collection_names_are_sorted() {
        let s = MemDocumentStore::new();
        s.insert("zeta", json!({})).await.unwrap();
        s.insert("alpha", json!({})).await.unwrap();
        assert_eq!(s.collection_names().await.unwrap(), vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn aggregate_match_then_count() {
        let s = MemDocumentStore::new();
        s.insert("a", json!({"k": "x"})).await.unwrap();
        s.insert("a", json!({"k": "x"})).await.unwrap();
        s.insert("a", json!({"k": "y"})).await.unwrap();
        let out = s
            .aggregate("a", &[json!({"$match": {"k": "x"}}), json!({"$count": "total"})])
            .await
            .unwrap();
        assert_eq!(out, vec![json!({"total": 2})]);
    }

    #[tokio::test]
    async fn aggregate_unknown_stage_is_unsupported() {
        let s = MemDocumentStore::new();
        let err = s.aggregate("a", &[json!({"$group": {}})]).await.unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }

    #[tokio::test]
    async fn admin_ping_answers_ok() {
        let s = MemDocumentStore::new();
        let out = s.admin_command(&json!({"ping": 1})).await.unwrap();
        assert_eq!(out["ok"], 1);
    }

    // ── Config store ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn config_store_round_trip() {
        let s = MemConfigStore::new();
        assert!(s.get("missing").await.unwrap().is_none());
        s.set("a", json!({"x": 1})).await.unwrap();
        assert_eq!(s.get("a").await.unwrap().unwrap()["x"], 1);
    }

    #[tokio::test]
    async fn config_store_set_overwrites() {
        let s = MemConfigStore::new();
        s.set("a", json!(1)).await.unwrap();
        s.set("a", json!(2)).await.unwrap();
        assert_eq!(s.get("a").await.unwrap().unwrap(), json!(2));
    }
}
