// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::store::{ConfigStore, Result};

/// File-backed [`ConfigStore`]: one pretty-printed JSON file per slug under a
/// base directory.  Slugs are used as file stems verbatim, so callers must
/// pass filesystem-safe slugs (the session manager derives them that way).
pub struct JsonDirConfigStore {
    base: PathBuf,
}

impl JsonDirConfigStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn path_for(&self, slug: &str) -> PathBuf {
        self.base.join(format!("{slug}.json"))
    }
}

#[async_trait]
impl ConfigStore for JsonDirConfigStore {
    async fn get(&self, slug: &str) -> Result<Option<Value>> {
        let path = self.path_for(slug);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, slug: &str, value: Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.base).await?;
        let path = self.path_for(slug);
        debug!(path = %path.display(), "writing config record");
        tokio::fs::write(&path, serde_json::to_vec_pretty(&value)?).await?;
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn missing_slug_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let s = JsonDirConfigStore::new(dir.path());
        assert!(s.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let s = JsonDirConfigStore::new(dir.path());
        s.set("session-abc", json!({"total_tokens": 42})).await.unwrap();
        let v = s.get("session-abc").await.unwrap().unwrap();
        assert_eq!(v["total_tokens"], 42);
    }

    #[tokio::test]
    async fn set_creates_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let s = JsonDirConfigStore::new(&nested);
        s.set("x", json!(1)).await.unwrap();
        assert!(nested.join("x.json").exists());
    }
}
