//! HTTP request handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use aluminati_agent::RunOptions;
use aluminati_core::estimate::EstimateResponse;
use aluminati_tools::ToolContext;

use crate::state::GatewayState;

pub const MIN_PROMPT_CHARS: usize = 10;
pub const MAX_PROMPT_CHARS: usize = 5000;
pub const MAX_ITERATIONS_LIMIT: i64 = 50;

/// Body of `POST /api/agent/estimate`.
#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Signed so that out-of-range values get a 400 instead of a
    /// deserialization rejection.
    #[serde(default)]
    pub max_iterations: Option<i64>,
}

/// Error body: `{ "error": "..." }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[cfg(feature = "metrics")]
        crate::metrics::record_rejected(self.status.as_u16());
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Validated estimate input.
#[derive(Debug, PartialEq, Eq)]
pub struct ValidEstimate {
    pub prompt: String,
    pub max_iterations: Option<u32>,
}

/// Reject missing, too short or too long prompts and out-of-range
/// iteration budgets.
pub fn validate(request: EstimateRequest) -> Result<ValidEstimate, ApiError> {
    let prompt = request
        .prompt
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("prompt is required"))?;

    let chars = prompt.chars().count();
    if chars < MIN_PROMPT_CHARS {
        return Err(ApiError::bad_request(format!(
            "prompt must be at least {MIN_PROMPT_CHARS} characters"
        )));
    }
    if chars > MAX_PROMPT_CHARS {
        return Err(ApiError::bad_request(format!(
            "prompt must be at most {MAX_PROMPT_CHARS} characters"
        )));
    }

    let max_iterations = match request.max_iterations {
        None => None,
        Some(n) if (1..=MAX_ITERATIONS_LIMIT).contains(&n) => Some(n as u32),
        Some(n) => {
            return Err(ApiError::bad_request(format!(
                "max_iterations must be between 1 and {MAX_ITERATIONS_LIMIT}, got {n}"
            )));
        }
    };

    Ok(ValidEstimate {
        prompt,
        max_iterations,
    })
}

/// `POST /api/agent/estimate`
pub async fn estimate(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<EstimateRequest>, JsonRejection>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let input = validate(request)?;

    let Some(gateway) = state.gateway.clone() else {
        warn!("Estimate requested but no model backend is configured");
        return Err(ApiError::unavailable(
            "No model backend credential is configured",
        ));
    };

    let request_id = uuid::Uuid::new_v4().to_string();
    let mut options = RunOptions::from_config(&state.config);
    if let Some(n) = input.max_iterations {
        options = options.with_max_iterations(n);
    }
    let context = ToolContext::new(request_id.clone(), state.config.clone());

    // Client disconnect drops this future; shutdown cancels the parent.
    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let _active = state.track_run();

    info!(
        request_id = %request_id,
        prompt_chars = input.prompt.chars().count(),
        max_iterations = options.max_iterations,
        "Estimate request accepted"
    );

    let response = aluminati_agent::estimate(
        &input.prompt,
        &options,
        &gateway,
        &state.tools,
        &context,
        &cancel,
    )
    .await;

    #[cfg(feature = "metrics")]
    crate::metrics::record_estimate(&response);

    Ok(Json(response))
}

/// `GET /health`
pub async fn health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model_configured": state.model_configured(),
        "active_runs": state.active_runs(),
    }))
}

/// `GET /api/tools`
pub async fn list_tools(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(json!({ "tools": state.tools.definitions() }))
}

/// `GET /metrics`
#[cfg(feature = "metrics")]
pub async fn metrics(State(state): State<Arc<GatewayState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: Option<&str>, max_iterations: Option<i64>) -> EstimateRequest {
        EstimateRequest {
            prompt: prompt.map(String::from),
            max_iterations,
        }
    }

    #[test]
    fn test_valid_request() {
        let valid = validate(request(Some("  8x H100 for 24 hours  "), Some(5))).unwrap();
        assert_eq!(valid.prompt, "8x H100 for 24 hours");
        assert_eq!(valid.max_iterations, Some(5));
    }

    #[test]
    fn test_prompt_bounds() {
        assert!(validate(request(None, None)).is_err());
        assert!(validate(request(Some("   "), None)).is_err());
        assert!(validate(request(Some("too short"), None)).is_err());
        assert!(validate(request(Some("exactly 10"), None)).is_ok());
        assert!(validate(request(Some(&"x".repeat(5000)), None)).is_ok());
        let err = validate(request(Some(&"x".repeat(5001)), None)).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_prompt_length_counts_characters() {
        // 10 multi-byte characters
        assert!(validate(request(Some("éééééééééé"), None)).is_ok());
    }

    #[test]
    fn test_iteration_bounds() {
        let prompt = Some("Estimate 4x A100 for a week");
        assert!(validate(request(prompt, Some(0))).is_err());
        assert!(validate(request(prompt, Some(-3))).is_err());
        assert!(validate(request(prompt, Some(51))).is_err());
        assert!(validate(request(prompt, Some(1))).is_ok());
        assert!(validate(request(prompt, Some(50))).is_ok());
    }
}
