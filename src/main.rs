// Civica - transparent civic resource allocation
// Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use civica::config::load_config;
use civica::engine::{self, Metrics};

#[derive(Parser)]
#[command(name = "civica", version, about = "Transparent civic resource allocation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the public API server
    Serve {
        /// Override the bind address (e.g. 0.0.0.0:8080)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run the analysis gateway service
    Gateway {
        /// Override the bind address (e.g. 0.0.0.0:8090)
        #[arg(long)]
        bind: Option<String>,
    },
    /// One-shot priority calculation, printed as JSON
    Score {
        #[arg(long)]
        poverty: f64,
        #[arg(long)]
        impact: f64,
        #[arg(long)]
        environment: f64,
        #[arg(long)]
        corruption: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = load_config()?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            config.validate()?;
            civica::server::run_server(config).await
        }
        Command::Gateway { bind } => {
            if let Some(bind) = bind {
                config.gateway_bind_address = bind;
            }
            config.validate()?;
            civica::gateway::run_gateway(config).await
        }
        Command::Score {
            poverty,
            impact,
            environment,
            corruption,
        } => {
            let result = engine::calculate(&Metrics {
                poverty_index: poverty,
                project_impact: impact,
                environmental_score: environment,
                corruption_risk: corruption,
            })?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}
