//! # Sanjagh
//!
//! Kubernetes operator for `Executer` resources.
//!
//! ```bash
//! # Reconcile Executers into Deployments
//! sanjagh manager
//!
//! # Serve the validating admission webhook
//! sanjagh --config /etc/sanjagh/config.yaml webhook
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use sanjagh::runtime::{self, Role};
use std::path::PathBuf;

/// Executer operator
#[derive(Debug, Parser)]
#[command(
    name = "sanjagh",
    version,
    about = "Executer operator and admission webhook",
    long_about = None
)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, short, global = true, env = "SANJAGH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the Executer controller
    Manager,
    /// Run the validating admission webhook
    Webhook,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Manager => {
            let init = runtime::initialize(cli.config, Role::Manager).await?;
            runtime::run_manager(init).await
        }
        Commands::Webhook => {
            let init = runtime::initialize(cli.config, Role::Webhook).await?;
            runtime::run_webhook(init).await
        }
    }
}
