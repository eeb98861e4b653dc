//! Application State

use std::path::PathBuf;
use std::sync::Arc;

use agent_core::{MemoryRecordStore, SessionManager};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Live sessions and the agent behind them
    pub sessions: Arc<SessionManager>,

    /// Conversation records saved after every submission
    pub records: Arc<MemoryRecordStore>,

    /// Project root used when a request names none
    pub default_working_dir: PathBuf,
}
