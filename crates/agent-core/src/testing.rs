//! Scripted provider for exercising the agent loop without a backend

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{AgentError, ErrorKind, Result};
use crate::provider::{GenerateRequest, LlmProvider, ModelResponse};
use crate::tool::ToolCall;

/// One scripted reply
#[derive(Clone, Debug)]
pub enum Step {
    Text(String),
    Calls(Vec<ToolCall>),
    Error(ErrorKind, String),
    /// Never resolves; only cancellation ends the call
    Hang,
}

impl Step {
    pub fn text(text: impl Into<String>) -> Self {
        Step::Text(text.into())
    }

    pub fn call(name: &str, args: serde_json::Value) -> Self {
        Step::Calls(vec![ToolCall::new(name, args)])
    }

    fn error(kind: ErrorKind, detail: String) -> AgentError {
        match kind {
            ErrorKind::State => AgentError::ConversationState(detail),
            ErrorKind::Network => AgentError::Network(detail),
            ErrorKind::Config => AgentError::Config(detail),
            ErrorKind::Generic => AgentError::Provider(detail),
        }
    }
}

/// Replays steps in order, then repeats the fallback
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback: Step::text("done"),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply once the script is exhausted
    pub fn with_fallback(mut self, step: Step) -> Self {
        self.fallback = step;
        self
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());

        let step = self
            .steps
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Text(text) => Ok(ModelResponse::from_text(text)),
            Step::Calls(calls) => Ok(ModelResponse::from_calls(calls)),
            Step::Error(kind, detail) => Err(Step::error(kind, detail)),
            Step::Hang => futures::future::pending().await,
        }
    }
}
