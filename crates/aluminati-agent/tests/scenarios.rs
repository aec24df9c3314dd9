//! End-to-end agent scenarios against a scripted model backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use aluminati_agent::{RunOptions, estimate, run_agent};
use aluminati_core::config::Config;
use aluminati_core::estimate::TerminalReason;
use aluminati_core::transcript::{ToolCallRequest, TranscriptEntry};
use aluminati_providers::gateway::ModelSettings;
use aluminati_providers::{
    CompletionRequest, Credentials, LlmProvider, ModelApi, ModelGateway, ModelResponse,
    ProviderError, RetryPolicy, ToolDefinition,
};
use aluminati_tools::{ToolContext, ToolRegistry};

#[derive(Clone)]
enum Step {
    Respond(ModelResponse),
    Fail(&'static str),
    Hang,
}

/// Plays back a script of responses; the last step repeats forever.
/// Records the formatted transcript of every request it receives.
struct ScriptedProvider {
    script: Mutex<Vec<Step>>,
    calls: AtomicU32,
    seen: Mutex<Vec<Vec<serde_json::Value>>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> Vec<serde_json::Value> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn api(&self) -> ModelApi {
        ModelApi::OpenAiCompletions
    }

    fn format_tools(&self, tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools.iter().map(|t| json!({ "name": t.name })).collect()
    }

    fn format_messages(&self, transcript: &[TranscriptEntry]) -> Vec<serde_json::Value> {
        transcript
            .iter()
            .map(|e| serde_json::to_value(e).unwrap())
            .collect()
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        _credentials: &Credentials,
    ) -> Result<ModelResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.messages.clone());
        let step = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        };
        match step {
            Step::Respond(response) => Ok(response),
            Step::Fail(message) => Err(ProviderError::Network(message.into())),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Timeout)
            }
        }
    }
}

struct Harness {
    provider: Arc<ScriptedProvider>,
    gateway: ModelGateway,
    tools: ToolRegistry,
    context: ToolContext,
}

fn harness(script: Vec<Step>) -> Harness {
    let provider = ScriptedProvider::new(script);
    let gateway = ModelGateway::new(
        provider.clone(),
        Credentials::None,
        ModelSettings {
            model: "scripted-model".into(),
            max_tokens: 512,
            temperature: Some(0.0),
        },
        RetryPolicy::none(),
    );
    Harness {
        provider,
        gateway,
        tools: ToolRegistry::with_builtin_tools().unwrap(),
        context: ToolContext::new("scenario", Arc::new(Config::default())),
    }
}

fn options(max_iterations: u32) -> RunOptions {
    RunOptions {
        max_iterations,
        time_budget: Duration::from_secs(30),
    }
}

fn tool_call(name: &str, arguments: serde_json::Value) -> Step {
    Step::Respond(ModelResponse::ToolCallRequests {
        text: None,
        calls: vec![ToolCallRequest::new(name, arguments)],
    })
}

fn final_answer(text: &str) -> Step {
    Step::Respond(ModelResponse::FinalAnswer(text.to_string()))
}

const PROMPT: &str = "Estimate the energy for fine-tuning a 7B model on 8x H100 for 24 hours";

#[tokio::test]
async fn scenario_a_structured_answer_after_one_tool_call() {
    let h = harness(vec![
        tool_call("gpu_specs", json!({"gpu_type": "H100"})),
        final_answer(
            r#"```json
{"kwh": 12.5, "carbon_kg": 5.2, "cost_usd": 1.8, "confidence": 0.8, "optimizations": ["use batching"], "reasoning_trace": ["computed from GPU TDP"]}
```"#,
        ),
    ]);

    let response = estimate(
        PROMPT,
        &options(10),
        &h.gateway,
        &h.tools,
        &h.context,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(response.raw_agent_response.iterations, 2);
    assert_eq!(response.raw_agent_response.tool_calls_made, 1);
    assert_eq!(response.raw_agent_response.terminal_reason, TerminalReason::FinalAnswer);
    assert_eq!(response.estimate.estimated_kwh, 12.5);
    assert_eq!(response.estimate.estimated_carbon_kg, 5.2);
    assert_eq!(response.estimate.estimated_cost_usd, 1.8);
    assert_eq!(response.estimate.confidence, 0.8);
    assert_eq!(response.estimate.optimizations, vec!["use batching".to_string()]);
    assert!(response.raw_agent_response.error.is_none());
}

#[tokio::test]
async fn scenario_b_iteration_budget_exhausted() {
    let h = harness(vec![tool_call(
        "calculate_energy",
        json!({"gpu_type": "H100", "num_gpus": 8, "duration_hours": 24}),
    )]);

    let response = estimate(
        PROMPT,
        &options(3),
        &h.gateway,
        &h.tools,
        &h.context,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(h.provider.calls(), 3);
    assert_eq!(response.raw_agent_response.iterations, 3);
    assert_eq!(response.raw_agent_response.tool_calls_made, 3);
    assert_eq!(
        response.raw_agent_response.terminal_reason,
        TerminalReason::BudgetExhausted
    );
    assert!(response.estimate.confidence <= 0.2);
    assert!(
        response
            .estimate
            .reasoning_trace
            .iter()
            .any(|r| r.contains("budget_exhausted"))
    );
    assert!(
        response
            .estimate
            .reasoning_trace
            .iter()
            .any(|r| r.starts_with("Incomplete response"))
    );
}

#[tokio::test]
async fn scenario_c_gateway_outage() {
    let h = harness(vec![Step::Fail("connection refused")]);

    let response = estimate(
        PROMPT,
        &options(10),
        &h.gateway,
        &h.tools,
        &h.context,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(h.provider.calls(), 1);
    assert_eq!(response.raw_agent_response.iterations, 1);
    assert_eq!(
        response.raw_agent_response.terminal_reason,
        TerminalReason::UnrecoverableFailure
    );
    assert_eq!(response.estimate.estimated_kwh, 0.0);
    assert_eq!(response.estimate.estimated_carbon_kg, 0.0);
    assert_eq!(response.estimate.estimated_cost_usd, 0.0);
    assert_eq!(response.estimate.confidence, 0.0);
    assert!(response.estimate.optimizations.is_empty());
    assert!(
        response
            .estimate
            .reasoning_trace
            .iter()
            .any(|r| r.contains("connection refused"))
    );
    assert!(
        response
            .raw_agent_response
            .error
            .as_deref()
            .is_some_and(|e| e.contains("connection refused"))
    );
}

#[tokio::test]
async fn scenario_d_clarifying_question_is_not_incomplete() {
    let h = harness(vec![final_answer(
        r#"I need a bit more information.
```json
{"estimated_kwh": 0, "estimated_carbon_kg": 0, "estimated_cost_usd": 0, "optimizations": [], "reasoning_trace": ["GPU type not specified"], "confidence": 0.1, "clarifying_questions": ["Which GPU model will you use?"]}
```"#,
    )]);

    let response = estimate(
        "Estimate the energy of training my model",
        &options(10),
        &h.gateway,
        &h.tools,
        &h.context,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(response.raw_agent_response.terminal_reason, TerminalReason::FinalAnswer);
    assert_eq!(response.estimate.estimated_kwh, 0.0);
    assert_eq!(
        response.estimate.clarifying_questions,
        Some(vec!["Which GPU model will you use?".to_string()])
    );
    assert!(
        !response
            .estimate
            .reasoning_trace
            .iter()
            .any(|r| r.starts_with("Incomplete response"))
    );
}

#[tokio::test]
async fn loop_never_exceeds_iteration_budget() {
    for max in 1..=6 {
        let h = harness(vec![tool_call("electricity_rate", json!({}))]);
        let run = run_agent(
            PROMPT,
            &options(max),
            &h.gateway,
            &h.tools,
            &h.context,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(h.provider.calls(), max, "max_iterations = {max}");
        assert_eq!(run.iterations, max);
        assert_eq!(run.terminal_reason, TerminalReason::BudgetExhausted);
    }
}

#[tokio::test]
async fn zero_iteration_budget_still_makes_one_call() {
    let h = harness(vec![final_answer(r#"{"estimated_kwh": 1}"#)]);
    let run = run_agent(
        PROMPT,
        &options(0),
        &h.gateway,
        &h.tools,
        &h.context,
        &CancellationToken::new(),
    )
    .await;
    assert_eq!(h.provider.calls(), 1);
    assert_eq!(run.terminal_reason, TerminalReason::FinalAnswer);
}

#[tokio::test]
async fn unknown_tool_is_fed_back_and_loop_continues() {
    let h = harness(vec![
        tool_call("web_search", json!({"query": "H100 power"})),
        final_answer(r#"{"estimated_kwh": 3.0, "confidence": 0.5}"#),
    ]);

    let run = run_agent(
        PROMPT,
        &options(5),
        &h.gateway,
        &h.tools,
        &h.context,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(run.terminal_reason, TerminalReason::FinalAnswer);
    assert_eq!(run.iterations, 2);
    assert_eq!(run.tool_calls_made, 1);

    let messages = h.provider.last_request();
    let tool_turn = messages
        .iter()
        .find(|m| m["role"] == "tool")
        .expect("tool result should be in the transcript");
    assert_eq!(tool_turn["result"]["is_error"], true);
    assert!(
        tool_turn["result"]["content"]
            .as_str()
            .unwrap()
            .contains("Unknown tool: web_search")
    );
}

#[tokio::test]
async fn invalid_tool_arguments_are_fed_back() {
    let h = harness(vec![
        tool_call("calculate_energy", json!({"gpu_type": "H100"})),
        final_answer(r#"{"estimated_kwh": 3.0}"#),
    ]);

    let run = run_agent(
        PROMPT,
        &options(5),
        &h.gateway,
        &h.tools,
        &h.context,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(run.terminal_reason, TerminalReason::FinalAnswer);
    let messages = h.provider.last_request();
    let tool_turn = messages.iter().find(|m| m["role"] == "tool").unwrap();
    assert_eq!(tool_turn["result"]["is_error"], true);
    assert!(
        tool_turn["result"]["content"]
            .as_str()
            .unwrap()
            .contains("num_gpus")
    );
}

#[tokio::test]
async fn tool_calls_counted_per_result() {
    let h = harness(vec![Step::Respond(ModelResponse::ToolCallRequests {
        text: Some("Looking up rates and intensity".into()),
        calls: vec![
            ToolCallRequest::new("electricity_rate", json!({"region": "eu-west"})),
            ToolCallRequest::new("carbon_intensity", json!({"region": "eu-west"})),
        ],
    })]);

    let run = run_agent(
        PROMPT,
        &options(2),
        &h.gateway,
        &h.tools,
        &h.context,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(run.tool_calls_made, 4);
    assert_eq!(run.final_answer, "Looking up rates and intensity");

    // Results come back in the order the model asked for them.
    let messages = h.provider.last_request();
    let tools: Vec<&str> = messages
        .iter()
        .filter(|m| m["role"] == "tool")
        .map(|m| m["result"]["tool"].as_str().unwrap())
        .collect();
    assert_eq!(tools, vec!["electricity_rate", "carbon_intensity"]);
}

#[tokio::test]
async fn tool_call_count_matches_transcript_results() {
    let h = harness(vec![
        Step::Respond(ModelResponse::ToolCallRequests {
            text: None,
            calls: vec![
                ToolCallRequest::new("gpu_specs", json!({"gpu_type": "A100"})),
                ToolCallRequest::new("power_curve", json!({"gpu_type": "A100", "utilization_pct": 70})),
            ],
        }),
        tool_call("carbon_intensity", json!({"region": "atlantis"})),
        tool_call(
            "calculate_energy",
            json!({"gpu_type": "A100", "num_gpus": 4, "duration_hours": 10}),
        ),
        final_answer(r#"{"estimated_kwh": 13.44, "confidence": 0.7}"#),
    ]);

    let run = run_agent(
        PROMPT,
        &options(10),
        &h.gateway,
        &h.tools,
        &h.context,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(run.terminal_reason, TerminalReason::FinalAnswer);
    assert_eq!(run.iterations, 4);

    // The final request carries the whole transcript, error results included.
    let messages = h.provider.last_request();
    let tool_turns = messages.iter().filter(|m| m["role"] == "tool").count();
    assert_eq!(run.tool_calls_made as usize, tool_turns);
    assert_eq!(run.tool_calls_made, 4);
    assert!(
        messages
            .iter()
            .filter(|m| m["role"] == "tool")
            .any(|m| m["result"]["is_error"] == true)
    );
}

#[tokio::test]
async fn cancelled_before_start() {
    let h = harness(vec![final_answer("unused")]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let response = estimate(
        PROMPT,
        &options(5),
        &h.gateway,
        &h.tools,
        &h.context,
        &cancel,
    )
    .await;

    assert_eq!(h.provider.calls(), 0);
    assert_eq!(response.raw_agent_response.iterations, 0);
    assert_eq!(response.raw_agent_response.terminal_reason, TerminalReason::Cancelled);
    assert_eq!(response.estimate.estimated_kwh, 0.0);
}

#[tokio::test(start_paused = true)]
async fn time_budget_interrupts_hung_model_call() {
    let h = harness(vec![Step::Hang]);
    let opts = RunOptions {
        max_iterations: 10,
        time_budget: Duration::from_secs(5),
    };

    let run = run_agent(
        PROMPT,
        &opts,
        &h.gateway,
        &h.tools,
        &h.context,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(run.terminal_reason, TerminalReason::BudgetExhausted);
    assert_eq!(run.iterations, 1);
    assert!(run.duration_ms >= 5_000);
}
