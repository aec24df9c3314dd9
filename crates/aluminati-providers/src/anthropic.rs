//! Anthropic Messages API provider.
//!
//! Calls `/v1/messages` without streaming. Consecutive tool results are
//! merged into a single user turn, as the Messages API requires.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use aluminati_core::transcript::{ToolCallRequest, TranscriptEntry};

use crate::error::ProviderError;
use crate::{
    CompletionRequest, Credentials, LlmProvider, ModelApi, ModelResponse, ToolDefinition,
};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AnthropicProvider {
    pub base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(ANTHROPIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: &'a [serde_json::Value],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [serde_json::Value]>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

fn into_model_response(response: MessagesResponse) -> ModelResponse {
    let mut text_parts = Vec::new();
    let mut calls = Vec::new();

    for block in response.content {
        match block {
            ResponseBlock::Text { text } => text_parts.push(text),
            ResponseBlock::ToolUse { id, name, input } => {
                let mut call = ToolCallRequest::new(name, input);
                if !id.is_empty() {
                    call.id = id;
                }
                calls.push(call);
            }
            ResponseBlock::Other => {}
        }
    }

    let text = text_parts.join("\n");
    if calls.is_empty() {
        ModelResponse::FinalAnswer(text)
    } else {
        ModelResponse::ToolCallRequests {
            text: Some(text).filter(|t| !t.trim().is_empty()),
            calls,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    fn api(&self) -> ModelApi {
        ModelApi::AnthropicMessages
    }

    fn format_tools(&self, tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters_schema,
                })
            })
            .collect()
    }

    fn format_messages(&self, transcript: &[TranscriptEntry]) -> Vec<serde_json::Value> {
        let mut messages: Vec<serde_json::Value> = Vec::new();
        let mut pending_results: Vec<serde_json::Value> = Vec::new();

        let flush = |messages: &mut Vec<serde_json::Value>, pending: &mut Vec<serde_json::Value>| {
            if !pending.is_empty() {
                messages.push(json!({ "role": "user", "content": std::mem::take(pending) }));
            }
        };

        for entry in transcript {
            match entry {
                TranscriptEntry::User { content, .. } => {
                    flush(&mut messages, &mut pending_results);
                    messages.push(json!({
                        "role": "user",
                        "content": [{ "type": "text", "text": content }],
                    }));
                }
                TranscriptEntry::Assistant {
                    text, tool_calls, ..
                } => {
                    flush(&mut messages, &mut pending_results);
                    let mut blocks = Vec::new();
                    if let Some(text) = text {
                        blocks.push(json!({ "type": "text", "text": text }));
                    }
                    for call in tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        }));
                    }
                    if !blocks.is_empty() {
                        messages.push(json!({ "role": "assistant", "content": blocks }));
                    }
                }
                TranscriptEntry::Tool { result, .. } => {
                    pending_results.push(json!({
                        "type": "tool_result",
                        "tool_use_id": result.call_id,
                        "content": result.content,
                        "is_error": result.is_error,
                    }));
                }
            }
        }
        flush(&mut messages, &mut pending_results);

        messages
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> Result<ModelResponse, ProviderError> {
        let Credentials::ApiKey { api_key } = credentials else {
            return Err(ProviderError::MissingCredentials(
                "Anthropic requires an API key".into(),
            ));
        };

        let body = MessagesRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            temperature: request.temperature,
            tools: request.tools.as_deref(),
        };

        debug!(model = %request.model, base_url = %self.base_url, "Calling Anthropic Messages API");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("content-type", "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            // 529 is Anthropic's "overloaded"; from_status files it under 5xx.
            return Err(ProviderError::from_status(status, body, retry_after));
        }

        let parsed: MessagesResponse = response.json().await?;
        Ok(into_model_response(parsed))
    }
}
