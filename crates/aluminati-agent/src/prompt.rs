//! System prompt builder for the estimation agent.

use aluminati_core::config::Config;
use aluminati_tools::ToolRegistry;

const IDENTITY: &str = "You are the AluminatiAI energy analyst. You estimate the electricity use, carbon emissions and electricity cost of GPU workloads such as model training, fine-tuning and inference.";

const METHOD: &str = "Use the available tools to look up GPU power characteristics, regional electricity rates and grid carbon intensity instead of guessing. Prefer calculate_energy for the final numbers. If a tool returns an error, read it and retry with corrected arguments.";

const OUTPUT_FORMAT: &str = r#"When you are done, reply with a single JSON object in a ```json fenced block with exactly these fields:
{
  "estimated_kwh": number,
  "estimated_carbon_kg": number,
  "estimated_cost_usd": number,
  "optimizations": [string],
  "reasoning_trace": [string],
  "confidence": number between 0 and 1,
  "clarifying_questions": [string]
}
If the request lacks information you cannot reasonably assume (for example the GPU type or duration), set the numeric fields to 0 and ask in clarifying_questions instead of estimating."#;

/// Build the system prompt for an estimate run.
pub fn build_system_prompt(config: &Config, tools: &ToolRegistry) -> String {
    let energy = config.energy();
    let mut parts = vec![IDENTITY.to_string(), METHOD.to_string()];

    let tool_names = tools.list();
    if !tool_names.is_empty() {
        parts.push(format!("Available tools: {}", tool_names.join(", ")));
    }

    parts.push(format!(
        "Defaults: region {} unless the user names one; datacenter PUE {}.",
        energy.default_region, energy.pue
    ));
    parts.push(OUTPUT_FORMAT.to_string());

    parts.join("\n\n")
}
