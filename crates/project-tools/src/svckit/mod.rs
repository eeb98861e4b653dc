//! Service Kit - Agent Tools
//!
//! Project tools implementing `agent_core::Tool`. Each tool turns expected
//! failures into `{success: false, error}` results; only argument problems
//! leave `execute` as an `Err`.

mod create_directory;
mod delete_file;
mod list_directory;
mod read_file;
mod run_terminal_command;
mod write_file;

use std::path::Path;

use agent_core::ToolContext;

pub use create_directory::CreateDirectoryTool;
pub use delete_file::DeleteFileTool;
pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use run_terminal_command::{DEFAULT_COMMAND_TIMEOUT, MAX_OUTPUT_CHARS, RunTerminalCommandTool};
pub use write_file::WriteFileTool;

/// Path as shown to the model: relative to the working directory when inside it
fn display_path(ctx: &ToolContext, path: &Path) -> String {
    path.strip_prefix(&ctx.working_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
