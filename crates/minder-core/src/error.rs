use thiserror::Error;

/// Errors the runtime propagates to callers.
///
/// [`AgentError::Aborted`] is the distinguished cancellation error: its
/// message is stable ("Operation aborted") because front-ends match on the
/// text to tell a user-initiated cancel from a genuine failure.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Operation aborted")]
    Aborted,
    #[error("agent '{0}' not found")]
    AgentNotFound(String),
}

/// Whether an error chain represents a cancellation.
///
/// Matched on message content, not type, so the check also works for errors
/// that crossed a serialization or FFI boundary.
pub fn is_abort(err: &anyhow::Error) -> bool {
    err.to_string().to_lowercase().contains("aborted")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
