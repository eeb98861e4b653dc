//! # agent-runtime
//!
//! Concrete provider adapters for the agent loop.
//!
//! ## Providers
//!
//! - **Gemini** (default): native multi-part messages and function calling
//! - **OpenAI**: chat completions with `tool_calls`
//! - **Ollama**: the OpenAI adapter pointed at Ollama's `/v1` endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::RuntimeConfig;
//!
//! let provider = RuntimeConfig::from_env()?.build_provider()?;
//! let agent = AgentBuilder::new()
//!     .provider(provider)
//!     .build()?;
//! ```

pub mod config;
pub mod gemini;
pub mod http;
pub mod openai;

pub use config::{ProviderKind, RuntimeConfig};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

// Re-export core types for convenience
pub use agent_core::{Agent, AgentError, LlmProvider, Result};
