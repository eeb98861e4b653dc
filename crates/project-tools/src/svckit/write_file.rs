//! Write File Tool
//!
//! Captures the previous contents before overwriting so the host can show a
//! diff. New files and unchanged writes produce no diff notification.

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult, ToolSchema,
    tool::{ParamType, ParameterSchema},
};
use async_trait::async_trait;

use crate::error::ToolError;

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "writeFile".into(),
            description: "Create or overwrite a file with the given contents. Parent directories are created as needed.".into(),
            parameters: vec![
                ParameterSchema::required("path", ParamType::String, "File path, relative to the project root"),
                ParameterSchema::required("contents", ParamType::String, "Complete new file contents"),
            ],
            destructive: true,
        }
    }

    async fn execute(&self, ctx: &ToolContext, call: &ToolCall) -> CoreResult<ToolResult> {
        let path = ctx.resolve(call.require_str("path")?);
        let contents = call.require_str("contents")?;

        let previous = match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Ok(ToolError::Read { path, source }.into()),
        };

        if let Some(parent) = path.parent() {
            if let Err(source) = tokio::fs::create_dir_all(parent).await {
                return Ok(ToolError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                }
                .into());
            }
        }

        if let Err(source) = tokio::fs::write(&path, contents).await {
            return Ok(ToolError::Write { path, source }.into());
        }

        tracing::info!(path = %path.display(), bytes = contents.len(), "File written");

        if let Some(before) = previous.as_deref() {
            if before != contents {
                ctx.notify_modified(&path, before, contents);
            }
        }

        Ok(ToolResult::success().with("path", super::display_path(ctx, &path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::DiffNotifier;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingDiff(Mutex<Vec<(PathBuf, String, String)>>);

    impl DiffNotifier for RecordingDiff {
        fn notify_modified(&self, path: &Path, before: &str, after: &str) {
            self.0
                .lock()
                .unwrap()
                .push((path.to_path_buf(), before.into(), after.into()));
        }
    }

    fn write(path: &str, contents: &str) -> ToolCall {
        ToolCall::new("writeFile", json!({"path": path, "contents": contents}))
    }

    #[tokio::test]
    async fn test_creates_parents_and_notifies_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let diff = Arc::new(RecordingDiff::default());
        let ctx = ToolContext::new(dir.path()).with_diff(diff.clone());

        let created = WriteFileTool.execute(&ctx, &write("src/new.txt", "one")).await.unwrap();
        assert!(created.success);
        assert_eq!(created.data["path"], "src/new.txt");
        assert_eq!(std::fs::read_to_string(dir.path().join("src/new.txt")).unwrap(), "one");
        assert!(diff.0.lock().unwrap().is_empty());

        WriteFileTool.execute(&ctx, &write("src/new.txt", "one")).await.unwrap();
        assert!(diff.0.lock().unwrap().is_empty());

        WriteFileTool.execute(&ctx, &write("src/new.txt", "two")).await.unwrap();
        let events = diff.0.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, "one");
        assert_eq!(events[0].2, "two");
    }

    #[test]
    fn test_missing_contents_is_validation_error() {
        let call = ToolCall::new("writeFile", json!({"path": "x.txt"}));
        assert!(WriteFileTool.validate(&call).is_err());
    }
}
