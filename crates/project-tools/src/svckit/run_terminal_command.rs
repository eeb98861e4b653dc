//! Run Terminal Command Tool
//!
//! Runs one shell command in the working directory and waits for it. The
//! child is killed if the timeout fires first.

use std::process::Stdio;
use std::time::Duration;

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult, ToolSchema,
    tool::{ParamType, ParameterSchema},
};
use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ToolError;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-stream cap on output handed back to the model
pub const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct RunTerminalCommandTool {
    timeout: Duration,
}

impl Default for RunTerminalCommandTool {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl RunTerminalCommandTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[cfg(windows)]
    fn shell(command: &str) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }

    #[cfg(not(windows))]
    fn shell(command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

fn clip(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.char_indices().nth(MAX_OUTPUT_CHARS) {
        Some((idx, _)) => format!("{}\n... [output truncated]", &text[..idx]),
        None => text.into_owned(),
    }
}

#[async_trait]
impl Tool for RunTerminalCommandTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "runTerminalCommand".into(),
            description: "Run a shell command in the project root and return its stdout and stderr.".into(),
            parameters: vec![ParameterSchema::required(
                "command",
                ParamType::String,
                "Shell command line to execute",
            )],
            destructive: true,
        }
    }

    async fn execute(&self, ctx: &ToolContext, call: &ToolCall) -> CoreResult<ToolResult> {
        let command = call.require_str("command")?;

        let mut cmd = Self::shell(command);
        cmd.current_dir(&ctx.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(command, cwd = %ctx.working_dir.display(), "Running terminal command");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                tracing::warn!(command, timeout_secs = self.timeout.as_secs(), "Command timed out");
                return Ok(ToolError::Timeout(self.timeout.as_secs()).into());
            }
            Ok(Err(e)) => return Ok(ToolError::Spawn(e).into()),
            Ok(Ok(output)) => output,
        };

        let stdout = clip(&output.stdout);
        let stderr = clip(&output.stderr);

        if output.status.success() {
            return Ok(ToolResult::success()
                .with("stdout", stdout)
                .with("stderr", stderr));
        }

        let error = match output.status.code() {
            Some(code) => format!("Command exited with status {code}"),
            None => "Command was terminated by a signal".to_string(),
        };
        tracing::debug!(command, %error, "Command failed");
        Ok(ToolResult::failure(error).with("stderr", stderr))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(command: &str) -> ToolCall {
        ToolCall::new("runTerminalCommand", json!({"command": command}))
    }

    #[tokio::test]
    async fn test_success_captures_output_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = RunTerminalCommandTool::default()
            .execute(&ctx, &run("ls; echo oops >&2"))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.data["stdout"].as_str().unwrap().contains("marker.txt"));
        assert_eq!(result.data["stderr"], "oops\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure_with_stderr() {
        let ctx = ToolContext::new(std::env::temp_dir());

        let result = RunTerminalCommandTool::default()
            .execute(&ctx, &run("echo broken >&2; exit 3"))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Command exited with status 3"));
        assert_eq!(result.data["stderr"], "broken\n");
    }

    #[tokio::test]
    async fn test_timeout() {
        let ctx = ToolContext::new(std::env::temp_dir());

        let result = RunTerminalCommandTool::new(Duration::from_millis(100))
            .execute(&ctx, &run("sleep 5"))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[test]
    fn test_output_is_clipped() {
        let long = "x".repeat(MAX_OUTPUT_CHARS + 10);
        let clipped = clip(long.as_bytes());
        assert!(clipped.ends_with("[output truncated]"));
        assert_eq!(clip(b"short"), "short");
    }
}
