//! Boundary normalization for parameters that models send either as a
//! structured object or as a JSON-encoded string.
//!
//! The tagged form exists so the ambiguity is resolved exactly once, at the
//! tool boundary; nothing deeper in the call chain ever sees both shapes.

use serde::Deserialize;
use serde_json::Value;

/// A parameter that may arrive as raw JSON text or as an already-parsed
/// value.  Variant order matters for `untagged`: a JSON string must bind to
/// `Raw`, everything else to `Parsed`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonArg {
    Raw(String),
    Parsed(Value),
}

impl JsonArg {
    /// Collapse to a single parsed value.  `Raw` text that is not valid JSON
    /// is the caller's recoverable error.
    pub fn normalize(self) -> Result<Value, serde_json::Error> {
        match self {
            JsonArg::Parsed(v) => Ok(v),
            JsonArg::Raw(s) => serde_json::from_str(&s),
        }
    }
}

impl From<Value> for JsonArg {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => JsonArg::Raw(s),
            other => JsonArg::Parsed(other),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
