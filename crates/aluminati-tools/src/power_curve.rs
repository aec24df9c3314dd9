//! power_curve tool: estimated board power at a given utilization.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::gpu_specs::unknown_gpu;
use crate::reference::lookup_gpu;
use crate::{Tool, ToolContext, ToolError, ToolOutput};

pub struct PowerCurveTool;

#[derive(Deserialize)]
struct Params {
    gpu_type: String,
    utilization_pct: f64,
}

#[async_trait]
impl Tool for PowerCurveTool {
    fn name(&self) -> &str {
        "power_curve"
    }

    fn description(&self) -> &str {
        "Estimate a single GPU's power draw in watts at a utilization percentage (0-100), interpolated linearly between idle power and TDP."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "gpu_type": {
                    "type": "string",
                    "description": "GPU model, e.g. H100"
                },
                "utilization_pct": {
                    "type": "number",
                    "description": "Average GPU utilization, 0 to 100"
                }
            },
            "required": ["gpu_type", "utilization_pct"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let p: Params = serde_json::from_value(params)?;
        if !(0.0..=100.0).contains(&p.utilization_pct) {
            return Err(ToolError::InvalidArguments(format!(
                "utilization_pct must be between 0 and 100, got {}",
                p.utilization_pct
            )));
        }
        let Some(spec) = lookup_gpu(&p.gpu_type) else {
            return Ok(unknown_gpu(&p.gpu_type));
        };

        Ok(ToolOutput::json(&json!({
            "model": spec.model,
            "utilization_pct": p.utilization_pct,
            "watts": spec.watts_at(p.utilization_pct),
            "idle_watts": spec.idle_watts,
            "tdp_watts": spec.tdp_watts,
        })))
    }
}
