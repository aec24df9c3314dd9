//! Tool registry and the built-in energy lookup tools.
//!
//! Tools are capabilities exposed to the model during an agent run. Each
//! tool implements the [`Tool`] trait and is registered once at startup;
//! the registry is read-only afterwards and shared by all requests.
//!
//! [`ToolRegistry::invoke`] never fails: unknown tools, malformed arguments,
//! tool errors and panics all come back as an error [`ToolResult`] so the
//! model can see what went wrong and adjust.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use aluminati_core::config::Config;
use aluminati_core::transcript::{ToolCallRequest, ToolResult};
use aluminati_providers::ToolDefinition;

pub mod calculate_energy;
pub mod carbon_intensity;
pub mod electricity_rate;
pub mod error;
pub mod gpu_specs;
pub mod power_curve;
pub mod reference;
pub mod schema;

pub use error::{RegistryError, ToolError};

/// Context provided to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Correlates tool log lines with the estimate request.
    pub request_id: String,
    pub config: Arc<Config>,
}

impl ToolContext {
    pub fn new(request_id: impl Into<String>, config: Arc<Config>) -> Self {
        Self {
            request_id: request_id.into(),
            config,
        }
    }
}

/// Output from a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// Successful output rendered as compact JSON.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::ok(value.to_string())
    }
}

/// The core tool trait. Every built-in tool implements this.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as exposed to the model (e.g., "gpu_specs").
    fn name(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Human-readable description for the model.
    fn description(&self) -> &str;

    /// Execute the tool with arguments that already passed schema validation.
    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError>;
}

/// Registry of available tools, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with every built-in energy tool.
    pub fn with_builtin_tools() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Box::new(gpu_specs::GpuSpecsTool))?;
        registry.register(Box::new(power_curve::PowerCurveTool))?;
        registry.register(Box::new(electricity_rate::ElectricityRateTool))?;
        registry.register(Box::new(carbon_intensity::CarbonIntensityTool))?;
        registry.register(Box::new(calculate_energy::CalculateEnergyTool))?;
        Ok(registry)
    }

    /// Add a tool. Names must be unique and schemas well-formed.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        schema::validate_schema(&tool.parameters_schema()).map_err(|reason| {
            RegistryError::InvalidSchema {
                tool: name.clone(),
                reason,
            }
        })?;
        debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool declarations for the model request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters_schema: t.parameters_schema(),
            })
            .collect()
    }

    /// Run one tool call and wrap the outcome as a [`ToolResult`].
    pub async fn invoke(&self, call: &ToolCallRequest, context: &ToolContext) -> ToolResult {
        let output = self.run(call, context).await;
        if output.is_error {
            warn!(
                request_id = %context.request_id,
                tool = %call.name,
                call_id = %call.id,
                error = %output.content,
                "Tool call failed"
            );
        }
        ToolResult {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            content: output.content,
            is_error: output.is_error,
        }
    }

    async fn run(&self, call: &ToolCallRequest, context: &ToolContext) -> ToolOutput {
        let Some(tool) = self.get(&call.name) else {
            return ToolOutput::error(format!(
                "Unknown tool: {}. Available tools: {}",
                call.name,
                self.list().join(", ")
            ));
        };

        // Some backends send `null` for tools without arguments.
        let params = if call.arguments.is_null() {
            serde_json::json!({})
        } else {
            call.arguments.clone()
        };

        if let Err(reason) = schema::validate_arguments(&tool.parameters_schema(), &params) {
            return ToolOutput::error(format!("Invalid arguments for {}: {reason}", call.name));
        }

        debug!(request_id = %context.request_id, tool = %call.name, call_id = %call.id, "Executing tool");

        match AssertUnwindSafe(tool.execute(params, context))
            .catch_unwind()
            .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => ToolOutput::error(format!("Tool error: {e}")),
            Err(panic) => ToolOutput::error(format!(
                "Tool error: {} panicked: {}",
                call.name,
                panic_message(panic.as_ref())
            )),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn context() -> ToolContext {
        ToolContext::new("test-request", Arc::new(Config::default()))
    }
}
