//! Model gateway: one logical model call with bounded retry.
//!
//! The gateway keeps no per-request state. The only thing shared across
//! concurrent requests is the provider's HTTP client, which is safe for
//! concurrent use.

use std::sync::Arc;

use tracing::{debug, warn};

use aluminati_core::config::Config;
use aluminati_core::transcript::Transcript;

use crate::error::{GatewayError, ProviderError};
use crate::retry::RetryPolicy;
use crate::{CompletionRequest, Credentials, LlmProvider, ModelResponse, ToolDefinition};

/// Per-call model settings.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

impl ModelSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.default_model(),
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
        }
    }
}

pub struct ModelGateway {
    provider: Arc<dyn LlmProvider>,
    credentials: Credentials,
    settings: ModelSettings,
    retry: RetryPolicy,
}

impl ModelGateway {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        credentials: Credentials,
        settings: ModelSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            credentials,
            settings,
            retry,
        }
    }

    /// Build a gateway for the first configured provider.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let provider_config = config.first_provider().ok_or_else(|| {
            ProviderError::MissingCredentials("no model provider configured".into())
        })?;
        let (provider, credentials) = crate::build_provider(provider_config)?;
        Ok(Self::new(
            provider,
            credentials,
            ModelSettings::from_config(config),
            RetryPolicy::from(&config.retry()),
        ))
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Send the transcript and tool declarations to the model.
    ///
    /// Transient failures are retried per the [`RetryPolicy`]; anything else
    /// fails immediately with [`GatewayError::Fatal`].
    pub async fn complete(
        &self,
        system: &str,
        transcript: &Transcript,
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, GatewayError> {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            messages: self.provider.format_messages(transcript.entries()),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tools: if tools.is_empty() {
                None
            } else {
                Some(self.provider.format_tools(tools))
            },
            system: Some(system.to_string()),
        };

        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(
                provider = self.provider.id(),
                model = %request.model,
                attempt,
                "Calling model backend"
            );
            match self.provider.complete(&request, &self.credentials).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_transient() => {
                    warn!(provider = self.provider.id(), %e, "Model backend rejected request");
                    return Err(GatewayError::Fatal(e));
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(
                        provider = self.provider.id(),
                        attempts = attempt,
                        %e,
                        "Model backend retries exhausted"
                    );
                    return Err(GatewayError::RetriesExhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = self.retry.delay_for(attempt - 1, &e);
                    warn!(
                        provider = self.provider.id(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %e,
                        "Transient model backend failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
