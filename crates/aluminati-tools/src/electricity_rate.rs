//! electricity_rate tool: average commercial electricity price per region.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::reference::{RegionProfile, known_regions, lookup_region};
use crate::{Tool, ToolContext, ToolError, ToolOutput};

pub struct ElectricityRateTool;

#[derive(Deserialize)]
struct Params {
    #[serde(default)]
    region: Option<String>,
}

/// Resolve `region`, falling back to the configured default. Shared by the
/// region-based tools.
pub(crate) fn resolve_region(
    region: Option<&str>,
    context: &ToolContext,
) -> Result<&'static RegionProfile, ToolOutput> {
    let name = match region.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => r.to_string(),
        None => context.config.energy().default_region,
    };
    lookup_region(&name).ok_or_else(|| {
        ToolOutput::error(format!(
            "Unknown region '{name}'. Known regions: {}",
            known_regions().join(", ")
        ))
    })
}

#[async_trait]
impl Tool for ElectricityRateTool {
    fn name(&self) -> &str {
        "electricity_rate"
    }

    fn description(&self) -> &str {
        "Average electricity price in USD per kWh for a region. Omit region to use the default."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "region": {
                    "type": "string",
                    "description": "Region, e.g. us-east, eu-west, asia-south"
                }
            },
            "required": []
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let p: Params = serde_json::from_value(params)?;
        let profile = match resolve_region(p.region.as_deref(), context) {
            Ok(profile) => profile,
            Err(output) => return Ok(output),
        };
        Ok(ToolOutput::json(&json!({
            "region": profile.region,
            "usd_per_kwh": profile.usd_per_kwh,
        })))
    }
}
