//! Agent runtime loop: model call, tool execution, repeat.
//!
//! The loop is a small state machine (awaiting model, executing tools,
//! done). It issues at most `max_iterations` model calls, checks the time
//! budget and the cancellation token before every call, and never returns
//! an error: every failure ends up in [`AgentRunResult::terminal_reason`].

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use aluminati_core::estimate::TerminalReason;
use aluminati_core::transcript::Transcript;
use aluminati_providers::{ModelGateway, ModelResponse};
use aluminati_tools::{ToolContext, ToolRegistry};

use crate::prompt::build_system_prompt;
use crate::{AgentRunResult, RunOptions};

/// Run the agent loop for one prompt.
pub async fn run_agent(
    prompt: &str,
    options: &RunOptions,
    gateway: &ModelGateway,
    tools: &ToolRegistry,
    context: &ToolContext,
    cancel: &CancellationToken,
) -> AgentRunResult {
    let start = Instant::now();
    let deadline = start + options.time_budget;
    let max_iterations = options.max_iterations.max(1);

    let system_prompt = build_system_prompt(&context.config, tools);
    let definitions = tools.definitions();
    let mut transcript = Transcript::with_user_prompt(prompt);

    let mut iterations: u32 = 0;
    let mut final_answer = String::new();

    let (terminal_reason, run_error) = loop {
        if cancel.is_cancelled() {
            break (TerminalReason::Cancelled, None);
        }
        if Instant::now() >= deadline {
            warn!(request_id = %context.request_id, iterations, "Time budget exhausted");
            break (TerminalReason::BudgetExhausted, None);
        }

        iterations += 1;
        debug!(request_id = %context.request_id, iteration = iterations, "Agent loop iteration");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => break (TerminalReason::Cancelled, None),
            _ = tokio::time::sleep_until(deadline) => {
                warn!(request_id = %context.request_id, iterations, "Time budget exhausted during model call");
                break (TerminalReason::BudgetExhausted, None);
            }
            response = gateway.complete(&system_prompt, &transcript, &definitions) => response,
        };

        match response {
            Err(e) => {
                error!(request_id = %context.request_id, %e, "Model gateway failed");
                break (TerminalReason::UnrecoverableFailure, Some(e.to_string()));
            }
            Ok(ModelResponse::FinalAnswer(text)) => {
                transcript.push_assistant(Some(text.clone()), Vec::new());
                if !text.trim().is_empty() {
                    final_answer = text;
                }
                break (TerminalReason::FinalAnswer, None);
            }
            Ok(ModelResponse::ToolCallRequests { text, calls }) => {
                if let Some(t) = text.as_ref().filter(|t| !t.trim().is_empty()) {
                    final_answer = t.clone();
                }
                transcript.push_assistant(text, calls.clone());

                // Sequential, in the order the model asked for them.
                for call in &calls {
                    info!(request_id = %context.request_id, tool = %call.name, "Executing tool");
                    let result = tools.invoke(call, context).await;
                    transcript.push_tool_result(result);
                }

                if iterations >= max_iterations {
                    warn!(request_id = %context.request_id, iterations, "Iteration budget exhausted");
                    break (TerminalReason::BudgetExhausted, None);
                }
            }
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let tool_calls_made = transcript.tool_results().count() as u32;
    info!(
        request_id = %context.request_id,
        iterations,
        tool_calls_made,
        terminal_reason = %terminal_reason,
        duration_ms,
        "Agent run finished"
    );

    AgentRunResult {
        final_answer,
        iterations,
        tool_calls_made,
        terminal_reason,
        error: run_error,
        duration_ms,
    }
}
