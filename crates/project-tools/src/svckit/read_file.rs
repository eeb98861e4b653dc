//! Read File Tool

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult, ToolSchema,
    tool::{ParamType, ParameterSchema},
};
use async_trait::async_trait;

use crate::error::ToolError;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "readFile".into(),
            description: "Read a text file and return its contents.".into(),
            parameters: vec![ParameterSchema::required(
                "path",
                ParamType::String,
                "File path, relative to the project root",
            )],
            destructive: false,
        }
    }

    async fn execute(&self, ctx: &ToolContext, call: &ToolCall) -> CoreResult<ToolResult> {
        let path = ctx.resolve(call.require_str("path")?);

        let result = match tokio::fs::read_to_string(&path).await {
            Ok(content) => ToolResult::success()
                .with("path", super::display_path(ctx, &path))
                .with("content", content),
            Err(source) => ToolError::Read { path, source }.into(),
        };
        Ok(result)
    }
}
