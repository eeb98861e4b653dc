//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM backends. The agent loop talks to a
//! provider only through [`LlmProvider::generate`]: one logical request in
//! (system instruction, uniform history, tool descriptors), one normalized
//! response out (text or tool calls).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{GenerateRequest, LlmProvider};
//!
//! let response = provider.generate(&request).await?;
//! if response.has_function_calls() {
//!     // dispatch tools
//! }
//! ```
//!
//! Adapters classify failures at this boundary: rejected turn ordering is
//! `AgentError::ConversationState`, connectivity is `AgentError::Network`,
//! an unsupported backend is `AgentError::Config`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Turn;
use crate::tool::{ToolCall, ToolSchema};

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gemini-2.0-flash", "gpt-4o-mini", "llama3.2")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 { 0.2 }
fn default_max_tokens() -> u32 { 4096 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// One logical request to a backend
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub system_instruction: String,

    /// Sanitized history, oldest first
    pub history: Vec<Turn>,

    /// Tool descriptors the model may call
    pub tools: Vec<ToolSchema>,
}

/// Token usage statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Normalized model response
///
/// Either `function_calls` is non-empty (and text is irrelevant) or the text
/// is the reply.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    text: String,
    function_calls: Vec<ToolCall>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ModelResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn from_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            function_calls: calls,
            ..Default::default()
        }
    }

    /// Build from parsed backend parts; calls win over text
    pub fn from_parts(text: String, calls: Vec<ToolCall>) -> Self {
        if calls.is_empty() {
            Self::from_text(text)
        } else {
            Self::from_calls(calls)
        }
    }

    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn function_calls(&self) -> &[ToolCall] {
        &self.function_calls
    }

    pub fn has_function_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }

    pub fn into_function_calls(self) -> Vec<ToolCall> {
        self.function_calls
    }
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend name for logs ("gemini", "openai", ...)
    fn name(&self) -> &str;

    /// Model identifier in use
    fn model(&self) -> &str;

    /// Obtain a single completion
    async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse>;

    /// Check if the provider is reachable and configured correctly
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
