//! Google Gemini provider
//!
//! Native multi-part messages: each turn becomes one `contents` entry with
//! role `user`/`model` and `text`, `functionCall` or `functionResponse`
//! parts. Tool descriptors go out as `functionDeclarations` with uppercase
//! schema types.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Part, Role, Turn},
    provider::{GenerateRequest, GenerationOptions, LlmProvider, ModelResponse, TokenUsage},
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::http::{build_client, classify_transport, send_json};

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Google Gemini LLM provider
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    options: GenerationOptions,
}

impl GeminiProvider {
    /// Fails fast on a missing key
    pub fn new(api_key: impl Into<String>, options: GenerationOptions, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::Config("GEMINI_API_KEY is not set".into()));
        }

        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url: API_BASE_URL.into(),
            options,
        })
    }

    /// Point at a proxy or test server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.options.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse> {
        let body = build_request(request, &self.options);

        tracing::debug!(
            model = %self.options.model,
            turns = request.history.len(),
            tools = request.tools.len(),
            "Gemini request"
        );

        let url = format!("{}/models/{}:generateContent", self.base_url, self.options.model);
        let response: ApiGenerateContentResponse = send_json(
            self.client
                .post(url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body),
            "gemini",
        )
        .await?;

        parse_response(response)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models/{}", self.base_url, self.options.model);
        match self
            .client
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("Gemini health check failed: {}", classify_transport(&e));
                Ok(false)
            }
        }
    }
}

// ============================================================================
// API Request Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerateContentRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiToolConfig>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum ApiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: ApiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: ApiFunctionResponse,
    },
    /// Part kinds this adapter does not use
    Other(Value),
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolConfig {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    prompt_feedback: Option<ApiPromptFeedback>,
    usage_metadata: Option<ApiUsageMetadata>,
}

#[derive(Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

// ============================================================================
// Conversion Functions
// ============================================================================

fn build_request(request: &GenerateRequest, options: &GenerationOptions) -> ApiGenerateContentRequest {
    let system_instruction = (!request.system_instruction.is_empty()).then(|| ApiContent {
        role: None,
        parts: vec![ApiPart::Text {
            text: request.system_instruction.clone(),
        }],
    });

    ApiGenerateContentRequest {
        contents: build_contents(&request.history),
        system_instruction,
        tools: build_tools(&request.tools),
        generation_config: ApiGenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_tokens,
        },
    }
}

/// One content per turn; adjacent same-role turns are merged
fn build_contents(history: &[Turn]) -> Vec<ApiContent> {
    let mut contents: Vec<ApiContent> = Vec::with_capacity(history.len());

    for turn in history {
        let role = match turn.role {
            Role::User => "user",
            Role::Model => "model",
        };
        let parts = turn.parts.iter().map(convert_part);

        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) => last.parts.extend(parts),
            _ => contents.push(ApiContent {
                role: Some(role.to_string()),
                parts: parts.collect(),
            }),
        }
    }

    contents
}

fn convert_part(part: &Part) -> ApiPart {
    match part {
        Part::Text(text) => ApiPart::Text { text: text.clone() },
        Part::ToolCall(call) => ApiPart::FunctionCall {
            function_call: ApiFunctionCall {
                name: call.name.clone(),
                args: Value::Object(call.args.clone()),
            },
        },
        Part::ToolResult(result) => ApiPart::FunctionResponse {
            function_response: ApiFunctionResponse {
                name: result.name.clone(),
                response: result.response.clone(),
            },
        },
    }
}

fn build_tools(tools: &[ToolSchema]) -> Vec<ApiToolConfig> {
    if tools.is_empty() {
        return Vec::new();
    }

    vec![ApiToolConfig {
        function_declarations: tools.iter().map(declaration).collect(),
    }]
}

/// Gemini rejects an OBJECT schema with no properties, so parameterless
/// tools omit `parameters`
fn declaration(schema: &ToolSchema) -> ApiFunctionDeclaration {
    let parameters = (!schema.parameters.is_empty()).then(|| {
        let properties: Map<String, Value> = schema
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({
                        "type": p.param_type.as_str().to_uppercase(),
                        "description": p.description,
                    }),
                )
            })
            .collect();

        json!({
            "type": "OBJECT",
            "properties": properties,
            "required": schema.required(),
        })
    });

    ApiFunctionDeclaration {
        name: schema.name.clone(),
        description: schema.description.clone(),
        parameters,
    }
}

fn parse_response(response: ApiGenerateContentResponse) -> Result<ModelResponse> {
    let usage = response.usage_metadata.map(|u| TokenUsage {
        prompt_tokens: u.prompt_token_count,
        completion_tokens: u.candidates_token_count,
        total_tokens: u.total_token_count,
    });

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates in response".into());
        return Err(AgentError::Provider(format!("Gemini returned no answer: {reason}")));
    };

    let mut texts = Vec::new();
    let mut calls = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        match part {
            ApiPart::Text { text } => texts.push(text),
            ApiPart::FunctionCall { function_call } => {
                calls.push(ToolCall::new(function_call.name, function_call.args));
            }
            ApiPart::FunctionResponse { .. } => {}
            ApiPart::Other(value) => {
                tracing::debug!(part = %value, "Ignoring unsupported Gemini part");
            }
        }
    }

    Ok(ModelResponse::from_parts(texts.concat(), calls).with_usage(usage))
}
