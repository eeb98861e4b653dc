//! Create Directory Tool

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult, ToolSchema,
    tool::{ParamType, ParameterSchema},
};
use async_trait::async_trait;

use crate::error::ToolError;

pub struct CreateDirectoryTool;

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "createDirectory".into(),
            description: "Create a directory and any missing parents. Succeeds if it already exists.".into(),
            parameters: vec![ParameterSchema::required(
                "path",
                ParamType::String,
                "Directory path, relative to the project root",
            )],
            destructive: false,
        }
    }

    async fn execute(&self, ctx: &ToolContext, call: &ToolCall) -> CoreResult<ToolResult> {
        let path = ctx.resolve(call.require_str("path")?);

        let result = match tokio::fs::create_dir_all(&path).await {
            Ok(()) => ToolResult::success().with("path", super::display_path(ctx, &path)),
            Err(source) => ToolError::CreateDirectory { path, source }.into(),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());
        let call = ToolCall::new("createDirectory", json!({"path": "a/b/c"}));

        assert!(CreateDirectoryTool.execute(&ctx, &call).await.unwrap().success);
        assert!(CreateDirectoryTool.execute(&ctx, &call).await.unwrap().success);
        assert!(dir.path().join("a/b/c").is_dir());
    }
}
