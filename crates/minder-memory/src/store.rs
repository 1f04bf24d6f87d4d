// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use minder_store::{DocumentStore, StoreError};

use crate::bootstrap::BOOTSTRAP_FILES;
use crate::namespace::NS_SEPARATOR;

/// Fixed category every memory file lives under.
pub const MEMORY_CATEGORY: &str = "agents_memory";

/// Backing collection in the document store.
pub const MEMORY_COLLECTION: &str = "memory_files";

/// Upper bound on search results.
const SEARCH_RESULT_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("memory file not found: {namespace}/{filename}")]
    NotFound { namespace: String, filename: String },
    #[error(
        "memory write verification failed for {namespace}/{filename}: \
         wrote {expected} bytes, store acknowledged {acknowledged}"
    )]
    VerificationFailed {
        namespace: String,
        filename: String,
        expected: usize,
        acknowledged: usize,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, MemoryError>;

/// A directory entry returned by [`MemoryStore::list`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub filename: String,
    pub title: String,
}

/// One search result, annotated with the subfolder it was found in
/// (relative to the searched prefix; `None` for the root namespace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub namespace: String,
    pub subfolder: Option<String>,
    pub filename: String,
    pub title: String,
}

/// Namespaced virtual filesystem of text documents.
///
/// Every operation is scoped to `(category = "agents_memory", namespace)`;
/// namespaces are flat strings, with subfolders encoded as `prefix__sub`.
/// Writes are verified against the store's write acknowledgment instead of a
/// read-back round trip.
pub struct MemoryStore {
    store: Arc<dyn DocumentStore>,
}

impl MemoryStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn key(namespace: &str, filename: &str) -> Value {
        json!({
            "category": MEMORY_CATEGORY,
            "namespace": namespace,
            "filename": filename,
        })
    }

    /// List filenames and titles in one namespace, sorted by filename.
    pub async fn list(&self, namespace: &str) -> Result<Vec<FileEntry>> {
        let filter = json!({ "category": MEMORY_CATEGORY, "namespace": namespace });
        let docs = self.store.find(MEMORY_COLLECTION, &filter, 0).await?;
        let mut entries: Vec<FileEntry> = docs
            .iter()
            .map(|d| FileEntry {
                filename: str_field(d, "filename"),
                title: str_field(d, "title"),
            })
            .collect();
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(entries)
    }

    /// Read one file's content; fails with [`MemoryError::NotFound`] if absent.
    pub async fn read(&self, namespace: &str, filename: &str) -> Result<String> {
        match self.read_opt(namespace, filename).await? {
            Some(content) => Ok(content),
            None => Err(MemoryError::NotFound {
                namespace: namespace.to_string(),
                filename: filename.to_string(),
            }),
        }
    }

    async fn read_opt(&self, namespace: &str, filename: &str) -> Result<Option<String>> {
        let doc = self
            .store
            .find_one(MEMORY_COLLECTION, &Self::key(namespace, filename))
            .await?;
        Ok(doc.map(|d| str_field(&d, "content")))
    }

    /// Upsert a file, deriving the title from the filename for new files and
    /// preserving the existing title on overwrite.
    pub async fn write(&self, namespace: &str, filename: &str, content: &str) -> Result<()> {
        let existing_title = self
            .store
            .find_one(MEMORY_COLLECTION, &Self::key(namespace, filename))
            .await?
            .map(|d| str_field(&d, "title"));
        let title = existing_title.unwrap_or_else(|| title_from_filename(filename));
        self.write_titled(namespace, filename, &title, content).await
    }

    /// Upsert a file with an explicit title.
    ///
    /// The write is reported successful only when the store's acknowledgment
    /// matches the byte length of the document we handed it.
    pub async fn write_titled(
        &self,
        namespace: &str,
        filename: &str,
        title: &str,
        content: &str,
    ) -> Result<()> {
        let doc = json!({
            "category": MEMORY_CATEGORY,
            "namespace": namespace,
            "filename": filename,
            "title": title,
            "content": content,
            "status": "active",
        });
        let expected = serde_json::to_vec(&doc).map_err(StoreError::from)?.len();
        let ack = self
            .store
            .upsert(MEMORY_COLLECTION, &Self::key(namespace, filename), doc)
            .await?;
        if ack.bytes != expected {
            return Err(MemoryError::VerificationFailed {
                namespace: namespace.to_string(),
                filename: filename.to_string(),
                expected,
                acknowledged: ack.bytes,
            });
        }
        debug!(namespace, filename, version = ack.version, "memory file written");
        Ok(())
    }

    /// Append a line-separated chunk to a file, creating it when absent.
    ///
    /// The growth check is advisory: a non-growing append is logged, never
    /// failed, because the write itself already passed verification.
    pub async fn append(&self, namespace: &str, filename: &str, content: &str) -> Result<()> {
        let existing = self.read_opt(namespace, filename).await?.unwrap_or_default();
        let combined = if existing.is_empty() {
            content.to_string()
        } else {
            format!("{existing}\n{content}")
        };
        self.write(namespace, filename, &combined).await?;
        if combined.len() <= existing.len() {
            warn!(namespace, filename, "append did not grow the file");
        }
        Ok(())
    }

    /// Search every namespace under `prefix` (the prefix itself and its
    /// `prefix__*` subfolders, never a sibling that merely starts with the
    /// same characters) for files whose title or content contains `query`
    /// case-insensitively.  Capped at 20 hits.
    pub async fn search(&self, prefix: &str, query: &str) -> Result<Vec<SearchHit>> {
        let boundary = Regex::new(&format!("^{}(?:$|{NS_SEPARATOR})", regex::escape(prefix)))
            .expect("escaped prefix is a valid regex");
        let needle = query.to_lowercase();
        let filter = json!({ "category": MEMORY_CATEGORY });
        let docs = self.store.find(MEMORY_COLLECTION, &filter, 0).await?;
        let mut hits = Vec::new();
        for d in &docs {
            let namespace = str_field(d, "namespace");
            if !boundary.is_match(&namespace) {
                continue;
            }
            let title = str_field(d, "title");
            let content = str_field(d, "content");
            if !title.to_lowercase().contains(&needle)
                && !content.to_lowercase().contains(&needle)
            {
                continue;
            }
            let subfolder = namespace
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix(NS_SEPARATOR))
                .map(str::to_string);
            hits.push(SearchHit {
                namespace,
                subfolder,
                filename: str_field(d, "filename"),
                title,
            });
            if hits.len() >= SEARCH_RESULT_LIMIT {
                break;
            }
        }
        Ok(hits)
    }

    /// Subfolder names (suffix after `prefix__`) that currently hold files.
    pub async fn subfolders(&self, prefix: &str) -> Result<Vec<String>> {
        let filter = json!({ "category": MEMORY_CATEGORY });
        let namespaces = self
            .store
            .distinct(MEMORY_COLLECTION, "namespace", &filter)
            .await?;
        let lead = format!("{prefix}{NS_SEPARATOR}");
        let mut subs: Vec<String> = namespaces
            .iter()
            .filter_map(|v| v.as_str())
            .filter_map(|ns| ns.strip_prefix(&lead))
            .map(str::to_string)
            .collect();
        subs.sort();
        subs.dedup();
        Ok(subs)
    }

    /// Idempotently create the fixed template set in the agent's root
    /// namespace.  A file is only created when nothing with that filename
    /// exists yet.
    pub async fn ensure_bootstrap(&self, prefix: &str) -> Result<()> {
        for (filename, title, content) in BOOTSTRAP_FILES {
            let exists = self
                .store
                .find_one(MEMORY_COLLECTION, &Self::key(prefix, filename))
                .await?
                .is_some();
            if !exists {
                self.write_titled(prefix, filename, title, content).await?;
            }
        }
        Ok(())
    }
}

fn str_field(doc: &Value, field: &str) -> String {
    doc.get(field).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn title_from_filename(filename: &str) -> String {
    let stem = filename.strip_suffix(".md").unwrap_or(filename);
    let mut title = stem.replace(['_', '-'], " ");
    if let Some(first) = title.get(..1) {
        let upper = first.to_uppercase();
        title.replace_range(..1, &upper);
    }
    title
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use minder_store::MemDocumentStore;

    use super::*;

    fn mem() -> MemoryStore {
        MemoryStore::new(Arc::new(MemDocumentStore::new()))
    }

    // ── Round trips ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn write_then_read_returns_exact_content() {
        let m = mem();
        m.write("atlas", "X.md", "hello").await.unwrap();
        assert_eq!(m.read("atlas", "X.md").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let m = mem();
        let err = m.read("atlas", "ghost.md").await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn overwrite_replaces_content_and_keeps_title() {
        let m = mem();
        m.write_titled("atlas", "a.md", "My Title", "v1").await.unwrap();
        m.write("atlas", "a.md", "v2").await.unwrap();
        assert_eq!(m.read("atlas", "a.md").await.unwrap(), "v2");
        let entries = m.list("atlas").await.unwrap();
        assert_eq!(entries[0].title, "My Title");
    }

    #[tokio::test]
    async fn list_is_sorted_and_scoped_to_namespace() {
        let m = mem();
        m.write("atlas", "b.md", "x").await.unwrap();
        m.write("atlas", "a.md", "x").await.unwrap();
        m.write("other", "z.md", "x").await.unwrap();
        let entries = m.list("atlas").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }

    #[tokio::test]
    async fn derived_title_prettifies_filename() {
        let m = mem();
        m.write("atlas", "meeting_notes.md", "x").await.unwrap();
        assert_eq!(m.list("atlas").await.unwrap()[0].title, "Meeting notes");
    }

    // ── Append ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn append_to_missing_file_creates_it() {
        let m = mem();
        m.append("atlas", "log.md", "first").await.unwrap();
        assert_eq!(m.read("atlas", "log.md").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn append_joins_with_newline() {
        let m = mem();
        m.append("atlas", "log.md", "first").await.unwrap();
        m.append("atlas", "log.md", "second").await.unwrap();
        assert_eq!(m.read("atlas", "log.md").await.unwrap(), "first\nsecond");
    }

    #[tokio::test]
    async fn append_empty_chunk_does_not_fail() {
        // The growth check is advisory only.
        let m = mem();
        m.write("atlas", "log.md", "content").await.unwrap();
        m.append("atlas", "log.md", "").await.unwrap();
    }

    // ── Search ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn search_matches_title_and_content_case_insensitively() {
        let m = mem();
        m.write_titled("atlas", "a.md", "Project Foo", "nothing here").await.unwrap();
        m.write("atlas", "b.md", "all about FOO and more").await.unwrap();
        m.write("atlas", "c.md", "unrelated").await.unwrap();
        let hits = m.search("atlas", "foo").await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn search_never_escapes_the_prefix() {
        let m = mem();
        m.write("atlas", "a.md", "foo").await.unwrap();
        m.write("atlas__notes", "b.md", "foo").await.unwrap();
        // Sibling namespace that merely starts with the same characters.
        m.write("atlasx", "c.md", "foo").await.unwrap();
        let hits = m.search("atlas", "foo").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.namespace == "atlas" || h.namespace.starts_with("atlas__")));
    }

    #[tokio::test]
    async fn search_annotates_subfolder_relative_to_prefix() {
        let m = mem();
        m.write("atlas", "root.md", "needle").await.unwrap();
        m.write("atlas__notes", "sub.md", "needle").await.unwrap();
        let hits = m.search("atlas", "needle").await.unwrap();
        let root = hits.iter().find(|h| h.filename == "root.md").unwrap();
        let sub = hits.iter().find(|h| h.filename == "sub.md").unwrap();
        assert_eq!(root.subfolder, None);
        assert_eq!(sub.subfolder.as_deref(), Some("notes"));
    }

    #[tokio::test]
    async fn search_is_capped_at_twenty_results() {
        let m = mem();
        for i in 0..30 {
            m.write("atlas", &format!("f{i}.md"), "needle").await.unwrap();
        }
        assert_eq!(m.search("atlas", "needle").await.unwrap().len(), 20);
    }

    // ── Subfolders ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn subfolders_lists_unique_suffixes() {
        let m = mem();
        m.write("atlas", "a.md", "x").await.unwrap();
        m.write("atlas__notes", "b.md", "x").await.unwrap();
        m.write("atlas__notes", "c.md", "x").await.unwrap();
        m.write("atlas__scratch", "d.md", "x").await.unwrap();
        assert_eq!(m.subfolders("atlas").await.unwrap(), vec!["notes", "scratch"]);
    }

    // ── Bootstrap ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn bootstrap_creates_the_template_set() {
        let m = mem();
        m.ensure_bootstrap("atlas").await.unwrap();
        let names: Vec<String> =
            m.list("atlas").await.unwrap().into_iter().map(|e| e.filename).collect();
        assert!(names.contains(&"persona.md".to_string()));
        assert!(names.contains(&"goals.md".to_string()));
        assert!(names.contains(&"decisions.md".to_string()));
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent_and_preserves_edits() {
        let m = mem();
        m.ensure_bootstrap("atlas").await.unwrap();
        m.write("atlas", "goals.md", "my custom goals").await.unwrap();
        m.ensure_bootstrap("atlas").await.unwrap();
        assert_eq!(m.read("atlas", "goals.md").await.unwrap(), "my custom goals");
    }
}
