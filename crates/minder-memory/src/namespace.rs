//! Namespace derivation for the virtual memory filesystem.
//!
//! A namespace is the folder a memory file lives in.  The root namespace for
//! an agent is `sanitize_name(agent.name)`; subfolders are joined onto it
//! with a double underscore, which is also the separator the search prefix
//! match keys on.

/// Separator between a root namespace and its subfolders.
pub const NS_SEPARATOR: &str = "__";

/// Derive an agent's root namespace from its display name.
///
/// Lowercases, collapses every run of non-alphanumeric characters into a
/// single underscore, and trims leading/trailing underscores so the result
/// never collides with the `__` subfolder separator.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Resolve a caller-supplied subfolder against an agent prefix.
///
/// Leading underscores are stripped from the subfolder so callers cannot
/// smuggle themselves into reserved namespaces (`__snapshots` and friends);
/// an empty or absent subfolder means the agent's root namespace.
pub fn resolve_namespace(prefix: &str, subfolder: Option<&str>) -> String {
    let sub = subfolder.unwrap_or("").trim().trim_start_matches('_');
    if sub.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}{NS_SEPARATOR}{sub}")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
