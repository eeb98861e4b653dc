//! List Directory Tool
//!
//! Recursive source-file listing. Dependency, build and VCS subtrees are
//! pruned, and only files with a known source or text extension are returned.

use std::path::{Path, PathBuf};

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult, ToolSchema,
    tool::{ParamType, ParameterSchema},
};
use async_trait::async_trait;
use walkdir::WalkDir;

use crate::error::ToolError;

const ALLOWED_EXTENSIONS: &[&str] = &[
    "rs", "toml", "ts", "tsx", "js", "jsx", "mjs", "cjs", "json", "py", "go", "java", "kt", "swift",
    "c", "h", "cpp", "hpp", "cc", "cs", "rb", "php", "html", "css", "scss", "vue", "svelte", "md",
    "txt", "yaml", "yml", "xml", "sql", "sh",
];

const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    ".git",
    "dist",
    "build",
    "out",
    "__pycache__",
    ".venv",
    "vendor",
];

pub struct ListDirectoryTool;

impl ListDirectoryTool {
    fn is_skipped(path: &Path) -> bool {
        path.components()
            .any(|c| SKIPPED_DIRS.iter().any(|skip| c.as_os_str() == *skip))
    }

    fn is_allowed(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    }

    /// Blocking walk; unreadable entries are skipped
    fn scan(root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| {
                // Only components below the root count
                let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
                entry.depth() == 0 || !Self::is_skipped(rel)
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable path");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && Self::is_allowed(entry.path()))
            .map(walkdir::DirEntry::into_path)
            .collect();

        files.sort();
        files
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "listDirectory".into(),
            description: "Recursively list source files under a directory, skipping dependency and build folders.".into(),
            parameters: vec![ParameterSchema::required(
                "directory",
                ParamType::String,
                "Directory path, relative to the project root ('.' for the root)",
            )],
            destructive: false,
        }
    }

    async fn execute(&self, ctx: &ToolContext, call: &ToolCall) -> CoreResult<ToolResult> {
        let root = ctx.resolve(call.require_str("directory")?);

        let scan_root = root.clone();
        let files = match tokio::task::spawn_blocking(move || Self::scan(&scan_root)).await {
            Ok(files) => files,
            Err(e) => return Ok(ToolError::Scan(e.to_string()).into()),
        };

        tracing::debug!(root = %root.display(), count = files.len(), "Directory listed");

        let files: Vec<String> = files
            .iter()
            .map(|path| super::display_path(ctx, path))
            .collect();
        Ok(ToolResult::success().with("files", files))
    }
}
