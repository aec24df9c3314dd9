//! OpenAI Chat Completions API provider.
//!
//! Calls `/v1/chat/completions` without streaming. Also serves OpenRouter,
//! Ollama, and other OpenAI-compatible backends.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, trace};

use aluminati_core::transcript::{ToolCallRequest, TranscriptEntry};

use crate::error::ProviderError;
use crate::{
    CompletionRequest, Credentials, LlmProvider, ModelApi, ModelResponse, ToolDefinition,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// API flavour; selects base URL and auth handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStyle {
    OpenAi,
    OpenRouter,
    Ollama,
}

pub struct OpenAiProvider {
    pub base_url: String,
    pub api_style: ApiStyle,
    provider_id: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    fn with_style(base_url: Option<&str>, default_url: &str, style: ApiStyle, id: &str) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(default_url)
                .trim_end_matches('/')
                .to_string(),
            api_style: style,
            provider_id: id.into(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn openai(base_url: Option<&str>) -> Self {
        Self::with_style(base_url, OPENAI_BASE_URL, ApiStyle::OpenAi, "openai")
    }

    pub fn openrouter(base_url: Option<&str>) -> Self {
        Self::with_style(base_url, OPENROUTER_BASE_URL, ApiStyle::OpenRouter, "openrouter")
    }

    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::with_style(base_url, OLLAMA_BASE_URL, ApiStyle::Ollama, "ollama")
    }
}

// --- OpenAI request/response types ---

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallPayload>,
}

#[derive(Debug, Deserialize)]
struct ToolCallPayload {
    #[serde(default)]
    id: Option<String>,
    function: FunctionPayload,
}

#[derive(Debug, Deserialize)]
struct FunctionPayload {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Map a parsed completion onto [`ModelResponse`].
fn into_model_response(completion: ChatCompletion) -> Result<ModelResponse, ProviderError> {
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| ProviderError::InvalidResponse("completion has no choices".into()))?;

    let text = message.content.filter(|c| !c.trim().is_empty());
    if message.tool_calls.is_empty() {
        return Ok(ModelResponse::FinalAnswer(text.unwrap_or_default()));
    }

    let calls = message
        .tool_calls
        .into_iter()
        .map(|tc| {
            // Malformed argument JSON becomes `{}` so schema validation can
            // report the missing fields back to the model.
            let arguments = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|e| {
                trace!(%e, raw = %tc.function.arguments, "Unparseable tool arguments");
                json!({})
            });
            let mut call = ToolCallRequest::new(tc.function.name, arguments);
            if let Some(id) = tc.id.filter(|id| !id.is_empty()) {
                call.id = id;
            }
            call
        })
        .collect();

    Ok(ModelResponse::ToolCallRequests { text, calls })
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn id(&self) -> &str {
        &self.provider_id
    }

    fn api(&self) -> ModelApi {
        ModelApi::OpenAiCompletions
    }

    fn format_tools(&self, tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    }
                })
            })
            .collect()
    }

    fn format_messages(&self, transcript: &[TranscriptEntry]) -> Vec<serde_json::Value> {
        let mut messages: Vec<serde_json::Value> = Vec::new();

        for entry in transcript {
            match entry {
                TranscriptEntry::User { content, .. } => {
                    messages.push(json!({ "role": "user", "content": content }));
                }
                TranscriptEntry::Assistant {
                    text, tool_calls, ..
                } => {
                    let mut msg = json!({ "role": "assistant" });
                    if let Some(text) = text {
                        msg["content"] = json!(text);
                    }
                    if !tool_calls.is_empty() {
                        let calls: Vec<serde_json::Value> = tool_calls
                            .iter()
                            .map(|c| {
                                json!({
                                    "id": c.id,
                                    "type": "function",
                                    "function": {
                                        "name": c.name,
                                        "arguments": c.arguments.to_string(),
                                    }
                                })
                            })
                            .collect();
                        msg["tool_calls"] = json!(calls);
                    }
                    if msg.get("content").is_some() || msg.get("tool_calls").is_some() {
                        messages.push(msg);
                    }
                }
                TranscriptEntry::Tool { result, .. } => {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": result.call_id,
                        "content": result.content,
                    }));
                }
            }
        }

        messages
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> Result<ModelResponse, ProviderError> {
        let api_key = match credentials {
            Credentials::ApiKey { api_key } => Some(api_key.as_str()),
            Credentials::None if self.api_style == ApiStyle::Ollama => None,
            Credentials::None => {
                return Err(ProviderError::MissingCredentials(format!(
                    "{} requires an API key",
                    self.provider_id
                )));
            }
        };

        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(request.messages.iter().cloned());

        let body = OpenAiRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: request.tools.clone(),
        };

        debug!(model = %body.model, base_url = %self.base_url, "Calling OpenAI-compatible API");

        let mut req_builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("content-type", "application/json");

        if let Some(key) = api_key {
            req_builder = req_builder.header("authorization", format!("Bearer {key}"));
        }
        if self.api_style == ApiStyle::OpenRouter {
            req_builder = req_builder.header("HTTP-Referer", "https://aluminatiai.com");
        }

        let response = req_builder.json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body, retry_after));
        }

        let completion: ChatCompletion = response.json().await?;
        into_model_response(completion)
    }
}
