//! Bootstrap template set created once per agent namespace.

/// `(filename, title, content)` for each template file.
///
/// `ensure_bootstrap` creates each file only when no document with that
/// filename exists yet in the agent's root namespace, so user edits are
/// never overwritten.
pub(crate) const BOOTSTRAP_FILES: &[(&str, &str, &str)] = &[
    (
        "persona.md",
        "Persona",
        "# Persona\n\nDescribe who this agent is and the voice it answers in.\n",
    ),
    (
        "identity.md",
        "Identity",
        "# Identity\n\nStable facts about this agent: owner, purpose, boundaries.\n",
    ),
    (
        "goals.md",
        "Active Goals",
        "# Active Goals\n\n- (none yet)\n",
    ),
    (
        "tasks.md",
        "Current Tasks",
        "# Current Tasks\n\n- (none yet)\n",
    ),
    (
        "decisions.md",
        "Decisions",
        "# Decisions\n\nRecord durable decisions here, one bullet per decision, with the date.\n",
    ),
    (
        "observations.md",
        "Observations",
        "# Observations\n\nNotable facts learned from conversations or tool output.\n",
    ),
    (
        "constraints.md",
        "Constraints",
        "# Constraints\n\nHard rules this agent must respect.\n",
    ),
];
