//! LLM provider abstraction and the model gateway.
//!
//! Each backend implements the [`LlmProvider`] trait: it formats the
//! transcript and tool declarations into its wire format and turns the reply
//! into a [`ModelResponse`]. The [`ModelGateway`] wraps a provider with
//! bounded retry for transient failures.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use aluminati_core::config::ProviderConfig;
use aluminati_core::transcript::{ToolCallRequest, TranscriptEntry};

pub mod anthropic;
pub mod error;
pub mod gateway;
pub mod openai;
pub mod retry;

pub use error::{GatewayError, ProviderError};
pub use gateway::ModelGateway;
pub use retry::RetryPolicy;

/// Supported LLM API protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelApi {
    AnthropicMessages,
    OpenAiCompletions,
}

/// Credentials for authenticating with an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Credentials {
    #[serde(rename = "api_key")]
    ApiKey { api_key: String },
    #[serde(rename = "none")]
    None,
}

/// Tool declaration sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// A request to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<serde_json::Value>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub tools: Option<Vec<serde_json::Value>>,
    pub system: Option<String>,
}

/// What the model wants next.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// No tools requested: this text is the model's answer.
    FinalAnswer(String),
    /// One or more tool calls, in the order the model produced them,
    /// optionally with interim text.
    ToolCallRequests {
        text: Option<String>,
        calls: Vec<ToolCallRequest>,
    },
}

/// The core LLM provider trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g., "anthropic", "openai").
    fn id(&self) -> &str;

    /// API protocol used by this provider.
    fn api(&self) -> ModelApi;

    /// Convert tool definitions into the provider's wire format.
    fn format_tools(&self, tools: &[ToolDefinition]) -> Vec<serde_json::Value>;

    /// Convert the transcript into the provider's message format.
    fn format_messages(&self, transcript: &[TranscriptEntry]) -> Vec<serde_json::Value>;

    /// Run one non-streaming completion.
    async fn complete(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> Result<ModelResponse, ProviderError>;
}

/// Build a provider and its credentials from config.
///
/// Fails with [`ProviderError::MissingCredentials`] when a key is required
/// but cannot be resolved, and for unknown provider ids.
pub fn build_provider(
    config: &ProviderConfig,
) -> Result<(Arc<dyn LlmProvider>, Credentials), ProviderError> {
    let base_url = config.base_url.as_deref();
    let provider: Arc<dyn LlmProvider> = match config.id.as_str() {
        "anthropic" => Arc::new(anthropic::AnthropicProvider::new(base_url)),
        "openai" => Arc::new(openai::OpenAiProvider::openai(base_url)),
        "openrouter" => Arc::new(openai::OpenAiProvider::openrouter(base_url)),
        "ollama" => Arc::new(openai::OpenAiProvider::ollama(base_url)),
        other => {
            return Err(ProviderError::MissingCredentials(format!(
                "unknown provider '{other}'"
            )));
        }
    };

    let credentials = match config.resolve_api_key() {
        Some(api_key) => Credentials::ApiKey { api_key },
        None if !config.requires_api_key() => Credentials::None,
        None => {
            return Err(ProviderError::MissingCredentials(format!(
                "no API key configured for provider '{}'",
                config.id
            )));
        }
    };

    Ok((provider, credentials))
}
