//! Per-request conversation transcript.
//!
//! A [`Transcript`] is owned by exactly one agent run. Entries can only be
//! appended; there is no way to remove or rewrite a turn once recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned correlation id (generated when the backend omits one).
    pub id: String,
    pub name: String,
    /// Arguments as supplied by the model. Usually an object.
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of one tool invocation, fed back to the model on the next turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool: String,
    pub content: String,
    pub is_error: bool,
}

/// A single turn in the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum TranscriptEntry {
    User {
        content: String,
        timestamp: DateTime<Utc>,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
        timestamp: DateTime<Utc>,
    },
    Tool {
        result: ToolResult,
        timestamp: DateTime<Utc>,
    },
}

/// Append-only ordered sequence of turns.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Start a transcript whose only turn is the user's prompt.
    pub fn with_user_prompt(prompt: &str) -> Self {
        let mut transcript = Self::default();
        transcript.push_user(prompt);
        transcript
    }

    pub fn push_user(&mut self, content: &str) {
        self.entries.push(TranscriptEntry::User {
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn push_assistant(&mut self, text: Option<String>, tool_calls: Vec<ToolCallRequest>) {
        self.entries.push(TranscriptEntry::Assistant {
            text: text.filter(|t| !t.is_empty()),
            tool_calls,
            timestamp: Utc::now(),
        });
    }

    pub fn push_tool_result(&mut self, result: ToolResult) {
        self.entries.push(TranscriptEntry::Tool {
            result,
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All tool results recorded so far, in transcript order.
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.entries.iter().filter_map(|e| match e {
            TranscriptEntry::Tool { result, .. } => Some(result),
            _ => None,
        })
    }
}
