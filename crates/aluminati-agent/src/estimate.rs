//! Estimation pipeline: agent run, answer parsing, response assembly.

use tokio_util::sync::CancellationToken;
use tracing::info;

use aluminati_core::estimate::{EnergyEstimate, EstimateResponse, RawAgentResponse, TerminalReason};
use aluminati_providers::ModelGateway;
use aluminati_tools::{ToolContext, ToolRegistry};

use crate::{AgentRunResult, RunOptions, parser, run_agent};

/// Confidence ceiling for runs that stopped before a final answer.
pub const PARTIAL_RUN_CONFIDENCE: f64 = 0.2;

/// Run the agent for `prompt` and turn the outcome into a response.
///
/// Never fails: gateway outages, exhausted budgets and cancellation all
/// produce a well-formed [`EstimateResponse`].
pub async fn estimate(
    prompt: &str,
    options: &RunOptions,
    gateway: &ModelGateway,
    tools: &ToolRegistry,
    context: &ToolContext,
    cancel: &CancellationToken,
) -> EstimateResponse {
    let run = run_agent(prompt, options, gateway, tools, context, cancel).await;
    let response = assemble(run);
    info!(
        request_id = %context.request_id,
        estimated_kwh = response.estimate.estimated_kwh,
        confidence = response.estimate.confidence,
        terminal_reason = %response.raw_agent_response.terminal_reason,
        "Estimate assembled"
    );
    response
}

/// Build the outbound response from a finished run.
pub fn assemble(run: AgentRunResult) -> EstimateResponse {
    let mut estimate = match (&run.terminal_reason, &run.error) {
        (TerminalReason::UnrecoverableFailure, error) => EnergyEstimate::zeroed(format!(
            "Estimation failed: {}",
            error.as_deref().unwrap_or("model backend unavailable")
        )),
        _ => parser::parse(&run.final_answer),
    };

    if run.terminal_reason.is_partial() {
        estimate.confidence = estimate.confidence.min(PARTIAL_RUN_CONFIDENCE);
        estimate.reasoning_trace.push(format!(
            "Run stopped early ({}) after {} iteration(s) and {} tool call(s); the estimate may be incomplete",
            run.terminal_reason, run.iterations, run.tool_calls_made
        ));
    }

    if run.terminal_reason != TerminalReason::UnrecoverableFailure && !estimate.is_complete() {
        estimate.reasoning_trace.push(
            "Incomplete response: the model gave neither a positive energy estimate nor clarifying questions"
                .to_string(),
        );
    }

    EstimateResponse {
        estimate,
        raw_agent_response: RawAgentResponse {
            iterations: run.iterations,
            tool_calls_made: run.tool_calls_made,
            duration_ms: run.duration_ms,
            final_answer: run.final_answer,
            terminal_reason: run.terminal_reason,
            error: run.error,
        },
    }
}
