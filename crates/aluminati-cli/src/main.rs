use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use aluminati_agent::RunOptions;
use aluminati_core::config::Config;
use aluminati_gateway::GatewayState;
use aluminati_providers::ModelGateway;
use aluminati_tools::{ToolContext, ToolRegistry};

mod logging;

#[derive(Parser)]
#[command(
    name = "aluminati",
    about = "Energy, carbon and cost estimates for AI workloads, driven by a tool-using agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to listen on (default: 8787)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a single estimate and print the JSON response
    Estimate {
        /// Workload description
        #[arg(short, long)]
        prompt: String,

        /// Upper bound on model round-trips
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// List the built-in tools
    Tools,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Check the configuration for problems
    Validate,
    /// Write a default configuration file if none exists
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    logging::init(config.logging.as_ref(), cli.verbose);
    tracing::debug!(path = %config_path.display(), "Configuration loaded");

    let config = Arc::new(config);

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or_else(|| config.gateway_port());
            tracing::info!("Starting AluminatiAI gateway on port {port}");

            let state = GatewayState::from_config(config.clone())?;
            #[cfg(feature = "metrics")]
            let state =
                state.with_metrics(aluminati_gateway::metrics::install_prometheus_recorder()?);

            aluminati_gateway::start_gateway(Arc::new(state), port).await?;
        }
        Commands::Estimate {
            prompt,
            max_iterations,
        } => {
            let gateway = ModelGateway::from_config(&config)
                .map_err(|e| anyhow::anyhow!("No usable model backend: {e}"))?;
            let tools = ToolRegistry::with_builtin_tools()?;

            let mut options = RunOptions::from_config(&config);
            if let Some(n) = max_iterations {
                options = options.with_max_iterations(n);
            }
            let context = ToolContext::new(uuid::Uuid::new_v4().to_string(), config.clone());

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupted; returning partial estimate");
                    on_interrupt.cancel();
                }
            });

            let response =
                aluminati_agent::estimate(&prompt, &options, &gateway, &tools, &context, &cancel)
                    .await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Tools => {
            let tools = ToolRegistry::with_builtin_tools()?;
            for def in tools.definitions() {
                println!("{:<20} {}", def.name, def.description);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(config.as_ref())?;
                println!("{json}");
            }
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    anyhow::bail!(
                        "{} configuration error(s) in {}",
                        errors.len(),
                        config_path.display()
                    );
                }
                println!("Config OK: {}", config_path.display());
            }
            ConfigAction::Init => {
                if config_path.exists() {
                    anyhow::bail!("{} already exists", config_path.display());
                }
                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Config::default().save(&config_path)?;
                println!("Wrote {}", config_path.display());
            }
        },
    }

    Ok(())
}
