//! # project-tools
//!
//! The tool set an agent uses to work on a local project: listing, reading,
//! writing and deleting files, creating directories and running shell
//! commands. Relative paths resolve against the session's working directory.
//!
//! ## Destructive tools
//!
//! ```text
//! ┌──────────────────────┬─────────────┐
//! │  listDirectory       │  read-only  │
//! │  readFile            │  read-only  │
//! │  createDirectory     │  additive   │
//! │  writeFile           │  gated      │
//! │  deleteFile          │  gated      │
//! │  runTerminalCommand  │  gated      │
//! └──────────────────────┴─────────────┘
//! ```
//!
//! Gated tools are withheld while a session is in dry-run mode.

pub mod error;
pub mod svckit;

use std::sync::Arc;
use std::time::Duration;

use agent_core::{Agent, AgentBuilder, LlmProvider, ToolRegistry};

pub use error::{Result, ToolError};
pub use svckit::{DEFAULT_COMMAND_TIMEOUT, MAX_OUTPUT_CHARS};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        CreateDirectoryTool, DeleteFileTool, ListDirectoryTool, ReadFileTool,
        RunTerminalCommandTool, WriteFileTool,
    };
}

/// Registry holding all six project tools
pub fn default_registry(command_timeout: Duration) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(tools::ListDirectoryTool);
    registry.register(tools::ReadFileTool);
    registry.register(tools::WriteFileTool);
    registry.register(tools::DeleteFileTool);
    registry.register(tools::CreateDirectoryTool);
    registry.register(tools::RunTerminalCommandTool::new(command_timeout));
    registry
}

/// Agent wired with the project tools and prompts
pub fn project_agent(provider: Arc<dyn LlmProvider>, command_timeout: Duration) -> agent_core::Result<Agent> {
    AgentBuilder::new()
        .provider(provider)
        .tools(default_registry(command_timeout))
        .system_prompt(PROJECT_ASSISTANT_PROMPT)
        .review_prompt(REVIEW_PROMPT)
        .build()
}

/// System prompt for the chat flow
pub const PROJECT_ASSISTANT_PROMPT: &str = r#"You are a coding assistant working directly inside the user's project.

## How to Work

1. Use `listDirectory` to find relevant files before guessing paths
2. Use `readFile` to read a file before changing it
3. Use `writeFile` with the complete new contents; never write partial files
4. Use `createDirectory` for new folders and `deleteFile` only when asked
5. Use `runTerminalCommand` for builds, tests and other shell tasks

## Rules

- All paths are relative to the project root
- Make the smallest change that does what the user asked
- After changing files, say briefly what you changed and why
- If a tool returns an error, read it and adjust instead of repeating the same call"#;

/// System prompt for the single-shot review flow
pub const REVIEW_PROMPT: &str = r#"You are reviewing code in the user's project.

## How to Review

1. Read the files the user points at with `readFile` (use `listDirectory` if you need to find them)
2. Explain any bug or problem you find, with the file and line
3. Describe the fix you propose, then ask: "Would you like me to apply this fix?"
4. Do not call `writeFile`, `deleteFile` or `runTerminalCommand` until the user agrees

## Finishing

- If there is nothing to fix, say "No issues found."
- After applying an approved fix, say "The fix has been applied." and summarise the change"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contents() {
        let registry = default_registry(DEFAULT_COMMAND_TIMEOUT);
        assert_eq!(
            registry.names(),
            vec![
                "createDirectory",
                "deleteFile",
                "listDirectory",
                "readFile",
                "runTerminalCommand",
                "writeFile",
            ]
        );

        for gated in ["writeFile", "deleteFile", "runTerminalCommand"] {
            assert!(registry.is_destructive(gated), "{gated} should be gated");
        }
        for open in ["listDirectory", "readFile", "createDirectory"] {
            assert!(!registry.is_destructive(open), "{open} should not be gated");
        }
    }
}
