// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
#[cfg(unix)]
use libc;
use regex::Regex;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::error::{ErrorCode, ToolError};
use crate::tool::{Tool, ToolCall, ToolContext};

/// Hard byte ceiling for stdout / stderr returned to the model.
const OUTPUT_LIMIT_BYTES: usize = 20_000;

/// Number of lines to keep from the head of oversized output.
const HEAD_LINES: usize = 100;

/// Number of lines to keep from the tail of oversized output.
/// Errors and summaries almost always appear at the end of command output,
/// so preserving the tail is at least as important as preserving the head.
const TAIL_LINES: usize = 100;

/// The conventional exit code `timeout(1)` uses for an expired command.
const TIMEOUT_EXIT_CODE: i32 = 124;

/// Built-in tool that runs a shell command.
///
/// Commands that do not carry their own timeout directive are killed after
/// `timeout_secs` by the executor itself, independent of any caller-side
/// cancellation.
pub struct ExecTool {
    pub timeout_secs: u64,
}

impl Default for ExecTool {
    fn default() -> Self {
        Self { timeout_secs: 15 }
    }
}

/// Detect a timeout directive already present in the command text: a leading
/// `timeout` invocation, a `--timeout[=<n>]` flag, or `-t <n>`.
fn has_timeout_directive(command: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^\s*timeout\s|(?:^|\s)--timeout(?:=\S+)?(?:\s|$)|(?:^|\s)-t\s+\d+")
            .expect("timeout directive pattern is valid")
    });
    re.is_match(command)
}

fn timeout_error(timeout_secs: u64, detail: impl Into<String>) -> String {
    ToolError::new(ErrorCode::ConnectionTimeout, "shell_execution_failed", detail.into())
        .recoverable(true)
        .suggest(format!(
            "the command was killed after {timeout_secs}s; prefix it with an explicit \
             `timeout <secs>` to run longer, or split it into smaller steps"
        ))
        .render()
}

#[async_trait]
impl Tool for ExecTool {
    fn name(&self) -> &str {
        "exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return {exit_code, stdout, stderr} as JSON.\n\
         Commands without their own timeout directive are killed after 15 seconds;\n\
         prefix long-running commands with `timeout <secs>` explicitly.\n\
         Output is capped at ~20 KB; when larger, the first and last 100 lines are\n\
         preserved with an omission marker in the middle.\n\
         Prefer non-interactive commands. Avoid commands that require a TTY."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The complete bash one liner shell command to execute."
                },
                "workdir": {
                    "type": "string",
                    "description": "Working directory (optional, defaults to cwd)"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> String {
        let command = match call.args.get("command").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolError::missing_required("command").render(),
        };
        let workdir = call.args.get("workdir").and_then(|v| v.as_str()).map(str::to_string);

        debug!(cmd = %command, "executing exec tool");

        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(&command);
        // stdin from /dev/null: subprocesses must not read the host terminal.
        cmd.stdin(Stdio::null());
        // When the timeout below fires and the future is dropped, tokio sends
        // SIGKILL to the child before releasing the handle.
        cmd.kill_on_drop(true);
        // setsid() detaches the child from the controlling terminal so it
        // cannot open /dev/tty behind our redirects.
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
        if let Some(wd) = &workdir {
            cmd.current_dir(wd);
        }

        let result = if has_timeout_directive(&command) {
            // The command manages its own deadline; run it to completion.
            cmd.output().await.map_err(|e| e.to_string())
        } else {
            match tokio::time::timeout(
                std::time::Duration::from_secs(self.timeout_secs),
                cmd.output(),
            )
            .await
            {
                Ok(out) => out.map_err(|e| e.to_string()),
                Err(_) => {
                    return timeout_error(
                        self.timeout_secs,
                        format!("command did not finish within {}s", self.timeout_secs),
                    )
                }
            }
        };

        let output = match result {
            Ok(o) => o,
            Err(e) => {
                return ToolError::new(
                    ErrorCode::InternalError,
                    "shell_execution_failed",
                    format!("failed to spawn command: {e}"),
                )
                .render()
            }
        };

        let code = output.status.code();
        if code == Some(TIMEOUT_EXIT_CODE) {
            return timeout_error(
                self.timeout_secs,
                "command exited with code 124 (timeout expired)",
            );
        }
        #[cfg(unix)]
        if code.is_none() {
            use std::os::unix::process::ExitStatusExt;
            let signal = output.status.signal().unwrap_or(-1);
            return ToolError::new(
                ErrorCode::ConnectionTimeout,
                "shell_execution_failed",
                format!("command was terminated by signal {signal}"),
            )
            .recoverable(true)
            .suggest(
                "the process was killed before completing; re-run with an explicit \
                 `timeout <secs>` prefix or a smaller workload",
            )
            .render();
        }

        json!({
            "exit_code": code.unwrap_or(-1),
            "stdout": head_tail_truncate(&String::from_utf8_lossy(&output.stdout)),
            "stderr": head_tail_truncate(&String::from_utf8_lossy(&output.stderr)),
        })
        .to_string()
    }
}

/// Truncate `s` to fit within `OUTPUT_LIMIT_BYTES`.
///
/// When truncation is needed the first `HEAD_LINES` and last `TAIL_LINES` are
/// kept verbatim, with an omission marker in the middle showing how many
/// lines and bytes were dropped.
pub(crate) fn head_tail_truncate(s: &str) -> String {
    if s.len() <= OUTPUT_LIMIT_BYTES {
        return s.to_string();
    }

    let lines: Vec<&str> = s.lines().collect();
    let total = lines.len();

    if total <= HEAD_LINES + TAIL_LINES {
        // Byte budget exceeded by very long lines; fall back to byte windows.
        let tail_start = s.len().saturating_sub(OUTPUT_LIMIT_BYTES / 2);
        let tail_str = &s[tail_start..];
        let head_end = OUTPUT_LIMIT_BYTES / 2;
        let head_str = &s[..head_end.min(s.len())];
        let omitted_bytes = s.len() - head_str.len() - tail_str.len();
        return format!("{}\n...[{} bytes omitted]...\n{}", head_str, omitted_bytes, tail_str);
    }

    let head: Vec<&str> = lines[..HEAD_LINES].to_vec();
    let tail: Vec<&str> = lines[total - TAIL_LINES..].to_vec();
    let omitted_lines = total - HEAD_LINES - TAIL_LINES;

    let shown_bytes = head.join("\n").len() + tail.join("\n").len();
    let omitted_bytes = s.len().saturating_sub(shown_bytes);

    format!(
        "{}\n...[{} lines / ~{} bytes omitted]...\n{}",
        head.join("\n"),
        omitted_lines,
        omitted_bytes,
        tail.join("\n")
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
