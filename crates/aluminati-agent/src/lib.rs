//! Agent runtime: the bounded model/tool loop and the estimation pipeline.
//!
//! [`run_agent`] drives the conversation with the model until it produces a
//! final answer or a budget runs out. [`estimate`] wraps a run and turns
//! the final answer into an [`EstimateResponse`] via the [`parser`].
//!
//! [`EstimateResponse`]: aluminati_core::estimate::EstimateResponse

use std::time::Duration;

use serde::{Deserialize, Serialize};

use aluminati_core::config::Config;
use aluminati_core::estimate::TerminalReason;

pub mod estimate;
pub mod parser;
pub mod prompt;
pub mod runtime;

pub use estimate::estimate;
pub use runtime::run_agent;

/// Budgets for a single agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Upper bound on model round-trips. Values below 1 are treated as 1.
    pub max_iterations: u32,
    /// Wall-clock budget for the whole run.
    pub time_budget: Duration,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_iterations: config.max_iterations(),
            time_budget: config.request_timeout(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of a finished agent run. Produced on every path, including
/// gateway failure and cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunResult {
    /// Last non-empty text the model produced; may be empty.
    pub final_answer: String,
    /// Number of model calls issued.
    pub iterations: u32,
    /// Number of tool results appended to the transcript.
    pub tool_calls_made: u32,
    pub terminal_reason: TerminalReason,
    /// Captured gateway error for [`TerminalReason::UnrecoverableFailure`].
    pub error: Option<String>,
    pub duration_ms: u64,
}
