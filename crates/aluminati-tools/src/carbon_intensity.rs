//! carbon_intensity tool: grid emissions factor per region.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::electricity_rate::resolve_region;
use crate::{Tool, ToolContext, ToolError, ToolOutput};

pub struct CarbonIntensityTool;

#[derive(Deserialize)]
struct Params {
    #[serde(default)]
    region: Option<String>,
}

#[async_trait]
impl Tool for CarbonIntensityTool {
    fn name(&self) -> &str {
        "carbon_intensity"
    }

    fn description(&self) -> &str {
        "Grid carbon intensity in kg CO2e per kWh for a region. Omit region to use the default."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "region": {
                    "type": "string",
                    "description": "Region, e.g. us-west, eu-north, uk"
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
            "kg_co2e_per_kwh": profile.kg_co2e_per_kwh,
        })))
    }
}
