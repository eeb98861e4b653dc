//! Delete File Tool

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult, ToolSchema,
    tool::{ParamType, ParameterSchema},
};
use async_trait::async_trait;

use crate::error::ToolError;

pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "deleteFile".into(),
            description: "Delete a file.".into(),
            parameters: vec![ParameterSchema::required(
                "path",
                ParamType::String,
                "File path, relative to the project root",
            )],
            destructive: true,
        }
    }

    async fn execute(&self, ctx: &ToolContext, call: &ToolCall) -> CoreResult<ToolResult> {
        let path = ctx.resolve(call.require_str("path")?);

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(ToolError::FileNotFound(path).into());
        }

        let result = match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "File deleted");
                ToolResult::success().with("path", super::display_path(ctx, &path))
            }
            Err(source) => ToolError::Delete { path, source }.into(),
        };
        Ok(result)
    }
}
