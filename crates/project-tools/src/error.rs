//! Error Types for Project Tools

use std::path::PathBuf;

use agent_core::ToolResult;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

/// Expected tool failures; always reported to the model as `{success: false, error}`
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("File not found")]
    FileNotFound(PathBuf),

    #[error("Could not read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Could not write {}: {source}", path.display())]
    Write { path: PathBuf, source: std::io::Error },

    #[error("Could not delete {}: {source}", path.display())]
    Delete { path: PathBuf, source: std::io::Error },

    #[error("Could not create directory {}: {source}", path.display())]
    CreateDirectory { path: PathBuf, source: std::io::Error },

    #[error("Failed to start command: {0}")]
    Spawn(std::io::Error),

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    #[error("Directory scan failed: {0}")]
    Scan(String),
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::failure(err.to_string())
    }
}
