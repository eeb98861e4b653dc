//! Agent Loop
//!
//! The state machine behind every submission:
//!
//! ```text
//!   instruction ──► awaiting_model ──calls──► dispatching_tools ─┐
//!                      ▲    │                                    │
//!                      │    └──text──► emitting_text ──► done    │
//!                      └─────────────────────────────────────────┘
//!   provider failure ──► error
//! ```
//!
//! One loop serves both flows. The chat flow ends every exchange on the first
//! non-empty text. The review flow starts in dry-run, routes question-like
//! text through the [`InteractionGate`], and switches to apply-fix on a yes.

use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, ErrorKind, Result};
use crate::events::{Notification, Observer};
use crate::gate::InteractionGate;
use crate::message::{Conversation, Turn};
use crate::provider::{GenerateRequest, LlmProvider};
use crate::sanitize::sanitize;
use crate::session::{Mode, Session};
use crate::tool::{ToolCall, ToolContext, ToolRegistry, ToolResult};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System instruction for the chat flow
    pub system_prompt: String,

    /// System instruction for the review flow
    pub review_prompt: String,

    /// Tool-dispatch cycles allowed per submission
    pub max_tool_cycles: usize,

    /// Reset-and-retry attempts after a conversation-state error
    pub max_state_retries: usize,

    /// History bound in turns
    pub max_history_turns: usize,

    /// Mode new chat sessions start in
    pub chat_mode: Mode,

    /// Appended as a user turn after the user approves a fix
    pub proceed_instruction: String,

    /// Review text containing one of these ends the review
    pub completion_phrases: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            review_prompt: DEFAULT_REVIEW_PROMPT.into(),
            max_tool_cycles: 15,
            max_state_retries: 2,
            max_history_turns: 20,
            chat_mode: Mode::ApplyFix,
            proceed_instruction: "Yes, proceed and apply the fix now.".into(),
            completion_phrases: vec![
                "review complete".into(),
                "no issues found".into(),
                "fix has been applied".into(),
                "changes have been applied".into(),
            ],
        }
    }
}

impl AgentConfig {
    fn is_completion(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.completion_phrases
            .iter()
            .any(|p| lower.contains(&p.to_lowercase()))
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a coding assistant working inside the user's project. \
Use the provided tools to inspect and change files. Be concise and accurate.";

const DEFAULT_REVIEW_PROMPT: &str = "You are reviewing code in the user's project. \
Inspect the relevant files with the provided tools, explain any problem you find, \
and ask the user whether to apply a fix before changing anything.";

/// How a submission ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Text delivered (or an empty reply)
    Completed,
    /// The tool-cycle budget ran out
    TurnLimit,
    /// The user declined a proposed fix
    Declined,
    /// Cancelled by the user
    Stopped,
    /// A provider or state error ended the exchange
    Failed(ErrorKind),
}

/// Loop states, for tracing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopState {
    AwaitingModel,
    DispatchingTools,
    EmittingText,
}

/// Per-submission inputs that are not session state
pub struct Submission<'a> {
    pub ctx: &'a ToolContext,
    pub cancel: &'a CancellationToken,
    pub observer: &'a dyn Observer,
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Chat flow: run one exchange and emit exactly one terminal notification
    pub async fn submit(&self, session: &mut Session, instruction: &str, run: &Submission<'_>) -> Outcome {
        session.mode = self.config.chat_mode;
        let result = self.run(session, instruction, run, None).await;
        finish(result, run.observer)
    }

    /// Review flow: start in dry-run and consult `gate` before applying fixes
    pub async fn review(
        &self,
        session: &mut Session,
        instruction: &str,
        gate: &InteractionGate,
        run: &Submission<'_>,
    ) -> Outcome {
        session.mode = Mode::DryRun;
        let result = self.run(session, instruction, run, Some(gate)).await;
        finish(result, run.observer)
    }

    async fn run(
        &self,
        session: &mut Session,
        instruction: &str,
        run: &Submission<'_>,
        gate: Option<&InteractionGate>,
    ) -> Result<Outcome> {
        let system_instruction = if gate.is_some() {
            &self.config.review_prompt
        } else {
            &self.config.system_prompt
        };
        let tools = self.tools.schemas();

        let anchor = Turn::user_text(instruction.trim());
        let mut seed = anchor.clone();
        session.conversation.push(anchor.clone());
        session.touch();

        let mut cycles = 0usize;
        let mut state_failures = 0usize;

        loop {
            let dropped = session
                .conversation
                .truncate_to(self.config.max_history_turns, &anchor);
            if dropped > 0 {
                tracing::debug!(session = %session.id, dropped, "Truncated history");
            }
            let history = prepare_history(&mut session.conversation, &seed);

            let request = GenerateRequest {
                system_instruction: system_instruction.clone(),
                history,
                tools: tools.clone(),
            };

            trace_state(session, LoopState::AwaitingModel, cycles);
            let response = tokio::select! {
                biased;
                () = run.cancel.cancelled() => {
                    tracing::info!(session = %session.id, "Generation stopped by user");
                    return Ok(Outcome::Stopped);
                }
                response = self.provider.generate(&request) => response,
            };

            let response = match response {
                Ok(response) => {
                    state_failures = 0;
                    response
                }
                Err(e) if e.is_state_error() => {
                    state_failures += 1;
                    if state_failures > self.config.max_state_retries {
                        tracing::error!(
                            session = %session.id,
                            attempts = state_failures,
                            "Conversation state could not be recovered"
                        );
                        return Err(AgentError::Unrecoverable {
                            attempts: state_failures,
                            last: e.to_string(),
                        });
                    }
                    tracing::warn!(
                        session = %session.id,
                        attempt = state_failures,
                        error = %e,
                        "Provider rejected history; resetting to instruction"
                    );
                    session.conversation.reset_to(seed.clone());
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        session = %session.id,
                        provider = self.provider.name(),
                        kind = %e.kind(),
                        error = %e,
                        "Provider call failed"
                    );
                    return Err(e);
                }
            };

            if response.has_function_calls() {
                if cycles >= self.config.max_tool_cycles {
                    tracing::warn!(session = %session.id, cycles, "Tool-cycle budget exhausted");
                    run.observer.notify(Notification::text(format!(
                        "Stopped after {} tool rounds without a final answer.",
                        cycles
                    )));
                    return Ok(Outcome::TurnLimit);
                }
                cycles += 1;
                trace_state(session, LoopState::DispatchingTools, cycles);
                self.dispatch(session, response.into_function_calls(), run).await;
                continue;
            }

            let text = response.text().trim();
            if text.is_empty() {
                return Ok(Outcome::Completed);
            }

            trace_state(session, LoopState::EmittingText, cycles);
            session.conversation.push(Turn::model_text(text));
            session.touch();
            run.observer.notify(Notification::text(text));

            let Some(gate) = gate else {
                return Ok(Outcome::Completed);
            };

            if self.config.is_completion(text) {
                return Ok(Outcome::Completed);
            }

            if session.mode == Mode::DryRun && gate.looks_like_question(text) {
                if !gate.confirm(text).await {
                    return Ok(Outcome::Declined);
                }
                session.mode = Mode::ApplyFix;
                let proceed = &self.config.proceed_instruction;
                seed = Turn::user_text(format!("{}\n\n{}", instruction.trim(), proceed));
                session.conversation.push(Turn::user_text(proceed.as_str()));
                continue;
            }

            return Ok(Outcome::Completed);
        }
    }

    /// Append the call turn, run each call in order, append the result turn
    async fn dispatch(&self, session: &mut Session, calls: Vec<ToolCall>, run: &Submission<'_>) {
        session.conversation.push(Turn::model_calls(calls.clone()));

        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            run.observer.notify(Notification::ToolEvent {
                name: call.name.clone(),
                args: Value::Object(call.args.clone()),
            });
            let result = self.invoke(call, session.mode, run.ctx).await;
            tracing::debug!(
                session = %session.id,
                tool = %call.name,
                success = result.success,
                "Tool finished"
            );
            results.push(result.into_response(call.name.as_str()));
        }

        session.conversation.push(Turn::tool_results(results));
        session.touch();
    }

    async fn invoke(&self, call: &ToolCall, mode: Mode, ctx: &ToolContext) -> ToolResult {
        if mode == Mode::DryRun && self.tools.is_destructive(&call.name) {
            tracing::info!(tool = %call.name, "Destructive tool withheld in dry-run");
            return ToolResult::failure(format!(
                "confirmation required: '{}' was not executed. Describe the change and ask the user whether to apply it.",
                call.name
            ));
        }

        match AssertUnwindSafe(self.tools.execute(ctx, call)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::debug!(tool = %call.name, error = %e, "Tool returned an error");
                ToolResult::failure(e.to_string())
            }
            Err(_) => {
                tracing::error!(tool = %call.name, "Tool panicked");
                ToolResult::failure(format!("Tool '{}' failed unexpectedly", call.name))
            }
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Sanitize in place; reseed when nothing valid is left
fn prepare_history(conversation: &mut Conversation, seed: &Turn) -> Vec<Turn> {
    let sanitized = sanitize(conversation.turns());

    if sanitized.is_empty() {
        tracing::warn!(turns = conversation.len(), "History unusable; reseeding with instruction");
        conversation.reset_to(seed.clone());
        return vec![seed.clone()];
    }

    if sanitized.len() != conversation.len() {
        tracing::debug!(
            dropped = conversation.len() - sanitized.len(),
            "Sanitizer repaired history"
        );
        conversation.replace(sanitized.clone());
    }

    sanitized
}

fn trace_state(session: &Session, state: LoopState, cycle: usize) {
    tracing::trace!(session = %session.id, ?state, cycle, "Agent loop transition");
}

/// Map a loop result to its single terminal notification
fn finish(result: Result<Outcome>, observer: &dyn Observer) -> Outcome {
    match result {
        Ok(Outcome::Stopped) => {
            observer.notify(Notification::Stopped);
            Outcome::Stopped
        }
        Ok(outcome) => {
            observer.notify(Notification::Done);
            outcome
        }
        Err(e) => {
            let kind = e.kind();
            observer.notify(Notification::Error {
                kind,
                detail: e.user_message(),
            });
            Outcome::Failed(kind)
        }
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: crate::tool::Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn review_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.review_prompt = prompt.into();
        self
    }

    pub fn max_tool_cycles(mut self, max: usize) -> Self {
        self.config.max_tool_cycles = max;
        self
    }

    pub fn max_state_retries(mut self, max: usize) -> Self {
        self.config.max_state_retries = max;
        self
    }

    pub fn max_history_turns(mut self, max: usize) -> Self {
        self.config.max_history_turns = max;
        self
    }

    pub fn chat_mode(mut self, mode: Mode) -> Self {
        self.config.chat_mode = mode;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
