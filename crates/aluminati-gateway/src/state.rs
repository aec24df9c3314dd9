//! Gateway shared state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use aluminati_core::config::Config;
use aluminati_providers::ModelGateway;
use aluminati_tools::ToolRegistry;

/// Shared state accessible from all handlers. Read-only after startup
/// apart from the in-flight counter.
pub struct GatewayState {
    pub config: Arc<Config>,
    /// `None` when no model credential is configured; estimates get `503`.
    pub gateway: Option<Arc<ModelGateway>>,
    pub tools: Arc<ToolRegistry>,
    /// Cancelled on shutdown; every estimate run holds a child token.
    pub shutdown: CancellationToken,
    active_runs: AtomicUsize,
    #[cfg(feature = "metrics")]
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(config: Arc<Config>, gateway: Option<ModelGateway>, tools: ToolRegistry) -> Self {
        Self {
            config,
            gateway: gateway.map(Arc::new),
            tools: Arc::new(tools),
            shutdown: CancellationToken::new(),
            active_runs: AtomicUsize::new(0),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Build state from config: built-in tools plus the first configured
    /// model backend, if its credentials resolve.
    pub fn from_config(config: Arc<Config>) -> anyhow::Result<Self> {
        let tools = ToolRegistry::with_builtin_tools()?;
        let gateway = if !config.has_model_credentials() {
            warn!("No model credential configured; estimate requests will return 503");
            None
        } else {
            match ModelGateway::from_config(&config) {
                Ok(gateway) => {
                    info!(
                        provider = gateway.provider_id(),
                        model = gateway.model(),
                        "Model backend configured"
                    );
                    Some(gateway)
                }
                Err(e) => {
                    warn!(%e, "No usable model backend; estimate requests will return 503");
                    None
                }
            }
        };
        Ok(Self::new(config, gateway, tools))
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, handle: metrics_exporter_prometheus::PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn model_configured(&self) -> bool {
        self.gateway.is_some()
    }

    pub fn active_runs(&self) -> usize {
        self.active_runs.load(Ordering::Relaxed)
    }

    /// Count a run as in flight until the returned guard drops.
    pub(crate) fn track_run(&self) -> ActiveRun<'_> {
        self.active_runs.fetch_add(1, Ordering::Relaxed);
        ActiveRun(&self.active_runs)
    }
}

pub(crate) struct ActiveRun<'a>(&'a AtomicUsize);

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aluminati_core::config::{ModelsConfig, ProviderConfig};

    #[test]
    fn test_from_default_config_has_no_gateway() {
        let state = GatewayState::from_config(Arc::new(Config::default())).unwrap();
        assert!(!state.model_configured());
        assert_eq!(state.tools.len(), 5);
    }

    fn with_provider(id: &str, api_key: Option<&str>) -> Arc<Config> {
        Arc::new(Config {
            models: Some(ModelsConfig {
                providers: Some(vec![ProviderConfig {
                    id: id.into(),
                    api_key_env: None,
                    api_key: api_key.map(String::from),
                    base_url: None,
                    default_model: None,
                }]),
            }),
            ..Config::default()
        })
    }

    #[test]
    fn test_provider_without_key_has_no_gateway() {
        let state = GatewayState::from_config(with_provider("openai", None)).unwrap();
        assert!(!state.model_configured());
    }

    #[test]
    fn test_provider_with_key_is_configured() {
        let state = GatewayState::from_config(with_provider("anthropic", Some("sk-test"))).unwrap();
        assert!(state.model_configured());

        let state = GatewayState::from_config(with_provider("ollama", None)).unwrap();
        assert!(state.model_configured());
    }

    #[test]
    fn test_active_run_guard() {
        let state = GatewayState::from_config(Arc::new(Config::default())).unwrap();
        {
            let _a = state.track_run();
            let _b = state.track_run();
            assert_eq!(state.active_runs(), 2);
        }
        assert_eq!(state.active_runs(), 0);
    }
}
