//! Stackflow CLI
//!
//! Plans the chat server topology and its delivery pipeline from a JSON
//! configuration, checks that the pipeline can reach the host, and runs a
//! dry simulation against in-memory collaborators.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use stackflow::observability::{init_tracing, TracingConfig};
use stackflow::prelude::*;
use stackflow::testing::{
    InMemoryCloudProvider, ScriptedBuildEnvironment, ScriptedDeployAgent, ScriptedSourceProvider,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "stackflow")]
#[command(about = "Plan a single-host topology and its delivery pipeline", long_about = None)]
struct Cli {
    /// Path to a JSON stack configuration. Built-in defaults are used when
    /// omitted.
    #[arg(long, global = true, env = "STACKFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the topology plan and pipeline definition as JSON
    Plan,
    /// Report deploy actions whose selector does not match the planned host
    Check {
        /// Exit with an error when any finding is reported
        #[arg(long)]
        strict: bool,
    },
    /// Apply the topology and run the pipeline against in-memory collaborators
    Simulate {
        /// Description of what triggered the run
        #[arg(long, default_value = "manual")]
        trigger: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingConfig::new().with_json(cli.log_json))
        .context("failed to initialize logging")?;

    let config = match &cli.config {
        Some(path) => StackConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => StackConfig::default(),
    };

    let topology = ChatServerStack::plan(&config.chat_server).context("invalid topology")?;
    let pipeline = DeliveryPipelineStack::plan(&config.pipeline).context("invalid pipeline")?;

    match cli.command {
        Commands::Plan => {
            let output = json!({
                "topology": topology,
                "pipeline": pipeline.to_json()?,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Check { strict } => {
            let findings = check_targeting(&topology, &pipeline);
            if findings.is_empty() {
                info!("Every deploy action matches the planned host");
            }
            for finding in &findings {
                println!(
                    "{} ({}) does not target {}:",
                    finding.action, finding.group, finding.host
                );
                for mismatch in &finding.mismatches {
                    println!("  - {mismatch}");
                }
            }
            if strict && !findings.is_empty() {
                bail!("{} deploy action(s) would deploy to no host", findings.len());
            }
        }
        Commands::Simulate { trigger } => {
            let registry = Arc::new(HostRegistry::new());
            let provider = InMemoryCloudProvider::new();
            let applied = topology
                .apply(&provider, &registry)
                .await
                .context("topology apply failed")?;
            info!(host = %applied.host.id, "Topology applied");

            let runner = PipelineRunner::new(
                Arc::new(pipeline),
                Arc::new(ScriptedSourceProvider::new()),
                Arc::new(ScriptedBuildEnvironment::new()),
                Arc::new(ScriptedDeployAgent::new()),
                registry,
            )
            .with_event_sink(Arc::new(LoggingEventSink::default()));

            let run = runner.run(trigger).await.context("pipeline run failed")?;
            if run.targeting_mismatch() {
                warn!("Deploy stage succeeded without reaching any host");
            }
            println!("{}", serde_json::to_string_pretty(&run)?);
            if !run.succeeded() {
                bail!("pipeline finished in state {}", run.state);
            }
        }
    }

    Ok(())
}
