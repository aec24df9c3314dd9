//! gpu_specs tool: power and memory characteristics of a GPU model.

use async_trait::async_trait;
use serde::Deserialize;

use crate::reference::{known_gpus, lookup_gpu};
use crate::{Tool, ToolContext, ToolError, ToolOutput};

pub struct GpuSpecsTool;

#[derive(Deserialize)]
struct Params {
    gpu_type: String,
}

/// Error output shared by every tool that takes a `gpu_type`.
pub(crate) fn unknown_gpu(gpu_type: &str) -> ToolOutput {
    ToolOutput::error(format!(
        "Unknown GPU type '{gpu_type}'. Known GPU types: {}",
        known_gpus().join(", ")
    ))
}

#[async_trait]
impl Tool for GpuSpecsTool {
    fn name(&self) -> &str {
        "gpu_specs"
    }

    fn description(&self) -> &str {
        "Look up a GPU model's thermal design power (TDP), idle power, memory and architecture. Accepts loose names such as \"NVIDIA H100 SXM\"."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "gpu_type": {
                    "type": "string",
                    "description": "GPU model, e.g. H100, A100, L4, MI300X"
                }
            },
            "required": ["gpu_type"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let p: Params = serde_json::from_value(params)?;
        let Some(spec) = lookup_gpu(&p.gpu_type) else {
            return Ok(unknown_gpu(&p.gpu_type));
        };
        Ok(ToolOutput::json(&serde_json::to_value(spec)?))
    }
}
