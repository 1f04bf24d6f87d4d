// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

fn default_history_window() -> usize {
    20
}

fn default_compaction_threshold() -> f32 {
    0.5
}

fn default_context_window() -> u32 {
    32_768
}

/// Tunables of the conversation runtime.
///
/// Every field has a serde default so a partial JSON/YAML config (or an
/// absent one) yields the documented behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// How many persisted history messages a turn loads (the history log is
    /// append-only; reads are always windowed to the most recent entries).
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Fraction of the model's context window that triggers inline
    /// compaction after a turn.
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: f32,
    /// Context window assumed for models missing from the catalog.
    #[serde(default = "default_context_window")]
    pub default_context_window: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            compaction_threshold: default_compaction_threshold(),
            default_context_window: default_context_window(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
