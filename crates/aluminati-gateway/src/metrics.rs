//! Prometheus metrics recording and endpoint.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use aluminati_core::estimate::EstimateResponse;

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {e}"))
}

/// Record a completed estimate.
pub fn record_estimate(response: &EstimateResponse) {
    let raw = &response.raw_agent_response;
    let labels = [("terminal_reason", raw.terminal_reason.as_str().to_string())];
    metrics::counter!("estimate_requests_total", &labels).increment(1);
    metrics::histogram!("estimate_duration_seconds", &labels).record(raw.duration_ms as f64 / 1000.0);
    metrics::histogram!("agent_iterations").record(f64::from(raw.iterations));
    metrics::histogram!("agent_tool_calls").record(f64::from(raw.tool_calls_made));
    metrics::histogram!("estimate_confidence").record(response.estimate.confidence);
}

/// Record a request refused before the agent ran.
pub fn record_rejected(status: u16) {
    let labels = [("status", status.to_string())];
    metrics::counter!("estimate_rejected_total", &labels).increment(1);
}
