//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Top-level AluminatiAI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<EnergyConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// --- Typed provider config ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<ProviderConfig>>,
}

/// Configuration for a single model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key: check `api_key` field first, then `api_key_env` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }

    /// Ollama runs locally and needs no key.
    pub fn requires_api_key(&self) -> bool {
        self.id != "ollama"
    }
}

/// Agent loop limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    /// End-to-end budget for one estimate request, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Backoff settings for transient model-backend failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    4_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Defaults for the energy lookup tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyConfig {
    /// Region used when the model does not name one.
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Power usage effectiveness multiplier applied to GPU draw.
    #[serde(default = "default_pue")]
    pub pue: f64,
}

fn default_region() -> String {
    "us-average".into()
}

fn default_pue() -> f64 {
    1.2
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            pue: default_pue(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_port() -> u16 {
    8787
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "aluminati_agent=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is a valid regex"));

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::AluminatiError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location: `~/.aluminati/config.json`.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Gateway port.
    pub fn gateway_port(&self) -> u16 {
        self.gateway.as_ref().map(|g| g.port).unwrap_or(8787)
    }

    /// Gateway bind address.
    pub fn gateway_bind(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    /// Model name from the first provider, or a backend-appropriate default.
    pub fn default_model(&self) -> String {
        let provider = self.first_provider();
        provider
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| match provider.map(|p| p.id.as_str()) {
                Some("openai") => "gpt-4o-mini".to_string(),
                Some("ollama") => "llama3.1".to_string(),
                _ => "claude-sonnet-4-20250514".to_string(),
            })
    }

    pub fn max_iterations(&self) -> u32 {
        self.agent
            .as_ref()
            .and_then(|a| a.max_iterations)
            .unwrap_or(10)
    }

    /// End-to-end execution budget for one estimate.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.agent
                .as_ref()
                .and_then(|a| a.timeout_secs)
                .unwrap_or(45),
        )
    }

    pub fn max_tokens(&self) -> u32 {
        self.agent
            .as_ref()
            .and_then(|a| a.max_tokens)
            .unwrap_or(2048)
    }

    pub fn temperature(&self) -> Option<f64> {
        Some(
            self.agent
                .as_ref()
                .and_then(|a| a.temperature)
                .unwrap_or(0.2),
        )
    }

    pub fn retry(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn energy(&self) -> EnergyConfig {
        self.energy.clone().unwrap_or_default()
    }

    /// Get the first provider config.
    pub fn first_provider(&self) -> Option<&ProviderConfig> {
        self.models
            .as_ref()
            .and_then(|m| m.providers.as_ref())
            .and_then(|p| p.first())
    }

    /// Whether a model backend can be reached with the configured credentials.
    pub fn has_model_credentials(&self) -> bool {
        self.first_provider()
            .is_some_and(|p| !p.requires_api_key() || p.resolve_api_key().is_some())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        match self.models.as_ref().and_then(|m| m.providers.as_ref()) {
            Some(providers) if !providers.is_empty() => {
                for p in providers {
                    if p.requires_api_key() && p.resolve_api_key().is_none() {
                        warnings.push(format!("Provider '{}' has no API key configured", p.id));
                    }
                }
            }
            _ => warnings.push("No model provider configured; estimates are unavailable".into()),
        }

        if self.max_iterations() == 0 {
            errors.push("agent.max_iterations must be at least 1".to_string());
        }

        if let Some(energy) = &self.energy {
            if !(energy.pue.is_finite() && energy.pue > 0.0) {
                errors.push(format!("energy.pue must be positive, got {}", energy.pue));
            }
        }

        if let Some(gw) = &self.gateway {
            if gw.port == 0 {
                errors.push("Gateway port cannot be 0".to_string());
            }
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for AluminatiAI data: `~/.aluminati/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".aluminati")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, variable name unique to this test
        unsafe { std::env::set_var("TEST_ALU_KEY", "sk-test-123") };
        let input = r#"{"key": "${TEST_ALU_KEY}", "other": "plain"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("sk-test-123"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_ALU_KEY") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_ALU_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway_port(), 8787);
        assert_eq!(config.max_iterations(), 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(45));
        assert_eq!(config.retry().max_retries, 2);
        assert_eq!(config.energy().default_region, "us-average");
        assert!(!config.has_model_credentials());
    }

    #[test]
    fn test_provider_resolve_api_key() {
        // SAFETY: test-only, variable name unique to this test
        unsafe { std::env::set_var("TEST_ALU_API_KEY", "from-env") };
        let provider = ProviderConfig {
            id: "anthropic".into(),
            api_key_env: Some("TEST_ALU_API_KEY".into()),
            api_key: None,
            base_url: None,
            default_model: None,
        };
        assert_eq!(provider.resolve_api_key(), Some("from-env".into()));

        let provider2 = ProviderConfig {
            api_key: Some("direct-key".into()),
            ..provider
        };
        // Direct key takes priority
        assert_eq!(provider2.resolve_api_key(), Some("direct-key".into()));
        unsafe { std::env::remove_var("TEST_ALU_API_KEY") };
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = Config {
            models: Some(ModelsConfig {
                providers: Some(vec![ProviderConfig {
                    id: "ollama".into(),
                    api_key: None,
                    api_key_env: None,
                    base_url: None,
                    default_model: None,
                }]),
            }),
            ..Config::default()
        };
        assert!(config.has_model_credentials());
        assert_eq!(config.default_model(), "llama3.1");
        let (warnings, errors) = config.validate();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_load_json5_with_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // comments are allowed
                models: { providers: [{ id: "openai", api_key: "sk-1" }] },
                agent: { max_iterations: 4, timeout_secs: 20 },
                energy: { default_region: "eu-west", pue: 1.1 },
                retry: { max_retries: 5 },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_iterations(), 4);
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert_eq!(config.energy().default_region, "eu-west");
        assert_eq!(config.retry().max_retries, 5);
        assert_eq!(config.retry().base_delay_ms, 500);
        assert_eq!(config.default_model(), "gpt-4o-mini");
        assert!(config.has_model_credentials());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert!(config.models.is_none());
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, crate::error::AluminatiError::Config(_)));
    }

    #[test]
    fn test_logging_config_defaults() {
        let config: Config = json5::from_str(r#"{ "logging": {} }"#).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert_eq!(logging.output, "stderr");
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_validate_missing_api_key_warns() {
        let config = Config {
            models: Some(ModelsConfig {
                providers: Some(vec![ProviderConfig {
                    id: "anthropic".into(),
                    api_key: None,
                    api_key_env: None,
                    base_url: None,
                    default_model: None,
                }]),
            }),
            ..Config::default()
        };
        let (warnings, _errors) = config.validate();
        assert!(
            warnings
                .iter()
                .any(|w| w.contains("anthropic") && w.to_lowercase().contains("key")),
            "Expected a warning about missing API key for anthropic, got: {warnings:?}"
        );
    }

    #[test]
    fn test_validate_rejects_zero_iterations_and_bad_pue() {
        let config = Config {
            agent: Some(AgentConfig {
                max_iterations: Some(0),
                ..AgentConfig::default()
            }),
            energy: Some(EnergyConfig {
                default_region: "us-average".into(),
                pue: -1.0,
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(errors.iter().any(|e| e.contains("max_iterations")));
        assert!(errors.iter().any(|e| e.contains("pue")));
    }
}
