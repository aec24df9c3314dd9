//! Energy estimate data model and the outbound response shape.

use serde::{Deserialize, Serialize};

/// Structured energy/cost/carbon estimate extracted from the agent's answer.
///
/// Invariants (restored by [`EnergyEstimate::sanitized`]):
/// - the three numeric estimates are finite and non-negative
/// - `confidence` lies in `[0, 1]`
///
/// Zero estimates together with non-empty `clarifying_questions` are a valid
/// terminal state: the model is asking for more input instead of estimating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyEstimate {
    pub estimated_kwh: f64,
    pub estimated_carbon_kg: f64,
    pub estimated_cost_usd: f64,
    pub optimizations: Vec<String>,
    pub reasoning_trace: Vec<String>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarifying_questions: Option<Vec<String>>,
}

impl EnergyEstimate {
    /// All-zero estimate with a single reasoning entry explaining why.
    pub fn zeroed(reason: impl Into<String>) -> Self {
        Self {
            estimated_kwh: 0.0,
            estimated_carbon_kg: 0.0,
            estimated_cost_usd: 0.0,
            optimizations: Vec::new(),
            reasoning_trace: vec![reason.into()],
            confidence: 0.0,
            clarifying_questions: None,
        }
    }

    /// Clamp every field back into its declared range.
    pub fn sanitized(mut self) -> Self {
        self.estimated_kwh = non_negative(self.estimated_kwh);
        self.estimated_carbon_kg = non_negative(self.estimated_carbon_kg);
        self.estimated_cost_usd = non_negative(self.estimated_cost_usd);
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.optimizations.retain(|s| !s.trim().is_empty());
        self.reasoning_trace.retain(|s| !s.trim().is_empty());
        if let Some(questions) = &mut self.clarifying_questions {
            questions.retain(|q| !q.trim().is_empty());
        }
        self
    }

    /// True when the model asked at least one clarifying question.
    pub fn asks_for_clarification(&self) -> bool {
        self.clarifying_questions
            .as_ref()
            .is_some_and(|q| !q.is_empty())
    }

    /// Either a positive energy estimate or a clarifying question is present.
    pub fn is_complete(&self) -> bool {
        self.estimated_kwh > 0.0 || self.asks_for_clarification()
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Why the agent loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// The model produced a final answer without requesting tools.
    FinalAnswer,
    /// The iteration or time budget ran out before a final answer.
    BudgetExhausted,
    /// The caller cancelled the request.
    Cancelled,
    /// The model gateway failed after exhausting its retries.
    UnrecoverableFailure,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinalAnswer => "final_answer",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Cancelled => "cancelled",
            Self::UnrecoverableFailure => "unrecoverable_failure",
        }
    }

    /// The run stopped early but may still carry a partial answer.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::BudgetExhausted | Self::Cancelled)
    }
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loop diagnostics attached to every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAgentResponse {
    pub iterations: u32,
    pub tool_calls_made: u32,
    pub duration_ms: u64,
    pub final_answer: String,
    pub terminal_reason: TerminalReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outbound shape returned to the request handler for every path,
/// success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateResponse {
    #[serde(flatten)]
    pub estimate: EnergyEstimate,
    pub raw_agent_response: RawAgentResponse,
}
