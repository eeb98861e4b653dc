//! OpenAI-compatible chat completions provider
//!
//! Flattens history into chat messages: model tool calls become an assistant
//! message with `tool_calls`, and each result becomes a `tool` message whose
//! `tool_call_id` is assigned by position. The same adapter serves Ollama
//! through its `/v1` compatibility endpoint.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Part, Role, Turn},
    provider::{GenerateRequest, GenerationOptions, LlmProvider, ModelResponse, TokenUsage},
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::{build_client, classify_transport, send_json};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// OpenAI-compatible LLM provider
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    name: &'static str,
    api_key: Option<String>,
    base_url: String,
    options: GenerationOptions,
}

impl OpenAiProvider {
    /// OpenAI proper; an API key is required
    pub fn new(api_key: impl Into<String>, options: GenerationOptions, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::Config("OPENAI_API_KEY is not set".into()));
        }

        Ok(Self {
            client: build_client(timeout)?,
            name: "openai",
            api_key: Some(api_key),
            base_url: DEFAULT_BASE_URL.into(),
            options,
        })
    }

    /// Local Ollama server, no key
    pub fn ollama(host: &str, port: u16, options: GenerationOptions, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            name: "ollama",
            api_key: None,
            base_url: format!("{}:{}/v1", host.trim_end_matches('/'), port),
            options,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        &self.options.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse> {
        let messages = build_messages(&request.system_instruction, &request.history);
        let tools: Vec<ApiTool> = request.tools.iter().map(convert_tool).collect();

        let body = ApiChatRequest {
            model: &self.options.model,
            messages: &messages,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            tools: (!tools.is_empty()).then_some(tools.as_slice()),
        };

        tracing::debug!(
            provider = self.name,
            model = %self.options.model,
            messages = messages.len(),
            "Chat completions request"
        );

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        let response: ApiChatResponse = send_json(self.authorize(request), self.name).await?;

        parse_response(response)
    }

    async fn health_check(&self) -> Result<bool> {
        let request = self.client.get(format!("{}/models", self.base_url));
        match self.authorize(request).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("{} health check failed: {}", self.name, classify_transport(&e));
                Ok(false)
            }
        }
    }
}

// ============================================================================
// API Request Types
// ============================================================================

#[derive(Serialize)]
struct ApiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ApiTool]>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: ApiRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: ApiRole, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ApiRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    id: String,
    r#type: &'static str,
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct ApiTool {
    r#type: &'static str,
    function: ApiFunction,
}

#[derive(Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Deserialize)]
struct ApiChatResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiResponseToolCall>>,
}

#[derive(Deserialize)]
struct ApiResponseToolCall {
    function: ApiResponseFunctionCall,
}

#[derive(Deserialize)]
struct ApiResponseFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

// ============================================================================
// Conversion Functions
// ============================================================================

fn build_messages(system: &str, history: &[Turn]) -> Vec<ApiMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if !system.is_empty() {
        messages.push(ApiMessage::text(ApiRole::System, system.to_string()));
    }

    // Ids of the latest call turn; results correlate by position
    let mut pending_ids: Vec<String> = Vec::new();

    for (turn_idx, turn) in history.iter().enumerate() {
        match turn.role {
            Role::Model if turn.has_tool_calls() => {
                let calls: Vec<ApiToolCall> = turn
                    .tool_calls()
                    .enumerate()
                    .map(|(i, call)| ApiToolCall {
                        id: format!("call_{turn_idx}_{i}"),
                        r#type: "function",
                        function: ApiFunctionCall {
                            name: call.name.clone(),
                            arguments: Value::Object(call.args.clone()).to_string(),
                        },
                    })
                    .collect();
                pending_ids = calls.iter().map(|c| c.id.clone()).collect();

                let text = turn.text();
                messages.push(ApiMessage {
                    role: ApiRole::Assistant,
                    content: (!text.is_empty()).then_some(text),
                    tool_calls: Some(calls),
                    tool_call_id: None,
                });
            }
            Role::Model => messages.push(ApiMessage::text(ApiRole::Assistant, turn.text())),
            Role::User => {
                let mut result_idx = 0;
                for part in &turn.parts {
                    match part {
                        Part::ToolResult(result) => {
                            let id = pending_ids
                                .get(result_idx)
                                .cloned()
                                .unwrap_or_else(|| format!("call_orphan_{turn_idx}_{result_idx}"));
                            result_idx += 1;
                            messages.push(ApiMessage {
                                role: ApiRole::Tool,
                                content: Some(result.response.to_string()),
                                tool_calls: None,
                                tool_call_id: Some(id),
                            });
                        }
                        Part::Text(text) => messages.push(ApiMessage::text(ApiRole::User, text.clone())),
                        Part::ToolCall(_) => {}
                    }
                }
            }
        }
    }

    messages
}

fn convert_tool(schema: &ToolSchema) -> ApiTool {
    ApiTool {
        r#type: "function",
        function: ApiFunction {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters: schema.json_schema(),
        },
    }
}

fn parse_response(response: ApiChatResponse) -> Result<ModelResponse> {
    let usage = response.usage.map(|u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Provider("no choices in response".into()))?;

    let calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            // Unparseable arguments become an empty mapping; validation then
            // reports the missing parameters back to the model
            let args = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|e| {
                tracing::warn!(tool = %tc.function.name, error = %e, "Malformed tool arguments");
                Value::Null
            });
            ToolCall::new(tc.function.name, args)
        })
        .collect();

    Ok(ModelResponse::from_parts(choice.message.content.unwrap_or_default(), calls).with_usage(usage))
}
