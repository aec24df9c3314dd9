//! calculate_energy tool: energy, carbon and cost for a GPU workload.
//!
//! ```text
//! kwh       = watts_per_gpu * num_gpus * duration_hours * pue / 1000
//! carbon_kg = kwh * kg_co2e_per_kwh(region)
//! cost_usd  = kwh * usd_per_kwh(region)
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::electricity_rate::resolve_region;
use crate::gpu_specs::unknown_gpu;
use crate::reference::lookup_gpu;
use crate::{Tool, ToolContext, ToolError, ToolOutput};

pub struct CalculateEnergyTool;

#[derive(Deserialize)]
struct Params {
    gpu_type: String,
    num_gpus: u32,
    duration_hours: f64,
    #[serde(default = "default_utilization")]
    utilization_pct: f64,
    #[serde(default)]
    model_size_gb: Option<f64>,
    #[serde(default)]
    region: Option<String>,
}

fn default_utilization() -> f64 {
    80.0
}

fn round(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[async_trait]
impl Tool for CalculateEnergyTool {
    fn name(&self) -> &str {
        "calculate_energy"
    }

    fn description(&self) -> &str {
        "Compute energy (kWh), carbon (kg CO2e) and electricity cost (USD) for a GPU workload, including datacenter overhead (PUE). Utilization defaults to 80%."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "gpu_type": {
                    "type": "string",
                    "description": "GPU model, e.g. H100"
                },
                "num_gpus": {
                    "type": "integer",
                    "description": "Number of GPUs, at least 1"
                },
                "duration_hours": {
                    "type": "number",
                    "description": "Wall-clock duration of the workload in hours"
                },
                "utilization_pct": {
                    "type": "number",
                    "description": "Average GPU utilization, 0 to 100 (default 80)"
                },
                "model_size_gb": {
                    "type": "number",
                    "description": "Model weights size in GB, used to check the GPUs can hold it"
                },
                "region": {
                    "type": "string",
                    "description": "Datacenter region (default from config)"
                }
            },
            "required": ["gpu_type", "num_gpus", "duration_hours"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let p: Params = serde_json::from_value(params)?;

        if p.num_gpus == 0 {
            return Err(ToolError::InvalidArguments("num_gpus must be at least 1".into()));
        }
        if !(p.duration_hours.is_finite() && p.duration_hours > 0.0) {
            return Err(ToolError::InvalidArguments(format!(
                "duration_hours must be positive, got {}",
                p.duration_hours
            )));
        }
        if !(0.0..=100.0).contains(&p.utilization_pct) {
            return Err(ToolError::InvalidArguments(format!(
                "utilization_pct must be between 0 and 100, got {}",
                p.utilization_pct
            )));
        }

        let Some(spec) = lookup_gpu(&p.gpu_type) else {
            return Ok(unknown_gpu(&p.gpu_type));
        };
        let profile = match resolve_region(p.region.as_deref(), context) {
            Ok(profile) => profile,
            Err(output) => return Ok(output),
        };

        let pue = context.config.energy().pue;
        let watts_per_gpu = spec.watts_at(p.utilization_pct);
        let kwh = watts_per_gpu * f64::from(p.num_gpus) * p.duration_hours * pue / 1000.0;

        let mut notes = Vec::new();
        if let Some(size) = p.model_size_gb {
            let capacity = spec.memory_gb * f64::from(p.num_gpus);
            if size > capacity {
                notes.push(format!(
                    "Model size {size} GB exceeds total GPU memory {capacity} GB; more GPUs or quantization would be required"
                ));
            }
        }

        Ok(ToolOutput::json(&json!({
            "gpu_type": spec.model,
            "num_gpus": p.num_gpus,
            "duration_hours": p.duration_hours,
            "utilization_pct": p.utilization_pct,
            "region": profile.region,
            "watts_per_gpu": round(watts_per_gpu, 1),
            "pue": pue,
            "kwh": round(kwh, 3),
            "carbon_kg": round(kwh * profile.kg_co2e_per_kwh, 3),
            "cost_usd": round(kwh * profile.usd_per_kwh, 2),
            "notes": notes,
        })))
    }
}
