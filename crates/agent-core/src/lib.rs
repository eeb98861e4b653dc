//! # agent-core
//!
//! Provider-agnostic agent orchestration: turn model, history sanitizer,
//! tool registry and the tool-calling loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SessionManager                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐   │
//! │  │ Agent Loop  │──│    Tool     │  │    LlmProvider      │   │
//! │  │ (sanitize,  │  │  Registry   │  │    (Strategy)       │   │
//! │  │  truncate)  │──│             │──│                     │   │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Gemini, OpenAI-compatible
//! servers or Ollama without changing agent logic.

pub mod agent;
pub mod error;
pub mod events;
pub mod gate;
pub mod message;
pub mod provider;
pub mod sanitize;
pub mod session;
pub mod tool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent::{Agent, AgentBuilder, AgentConfig, Outcome, Submission};
pub use error::{AgentError, ErrorKind, Result};
pub use events::{Notification, NotificationLog, Observer};
pub use gate::{Confirmer, InteractionGate, KeywordDetector, QuestionDetector};
pub use message::{Conversation, Part, Role, Turn};
pub use provider::{GenerateRequest, GenerationOptions, LlmProvider, ModelResponse};
pub use session::{ConversationRecord, MemoryRecordStore, Mode, RecordStore, Session, SessionId, SessionManager};
pub use tool::{DiffNotifier, Tool, ToolCall, ToolContext, ToolRegistry, ToolResult, ToolSchema};
