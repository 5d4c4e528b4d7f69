//! SaaS Runtime project provisioner CLI.
//!
//! Provisions a single Google Cloud project for a SaaS Runtime workload:
//! project, required APIs, service accounts with their role grants, and an
//! Artifact Registry repository. All operations are idempotent; re-running
//! against an already-provisioned project changes nothing.

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod context;
mod orchestrator;
mod ui;
mod validator;

use commands::provision::ProvisionCommand;

/// SaaS Runtime - Google Cloud project provisioner.
#[derive(Parser)]
#[command(
    name = "saas-provision",
    version,
    about = "Provision a Google Cloud project for SaaS Runtime",
    long_about = "Provision a Google Cloud project for a SaaS Runtime workload.\n\n\
                  Creates the project, enables the required APIs, establishes the\n\
                  SaaS Runtime, Infra Manager and compute service accounts with\n\
                  their role grants, and creates an Artifact Registry repository.\n\n\
                  All operations are idempotent - resources that already exist\n\
                  are left untouched."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the project and its SaaS Runtime resources.
    Provision(ProvisionCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("info,gcloud=debug,saas_provision=debug")
    } else {
        EnvFilter::new("warn,gcloud=info,saas_provision=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Provision(cmd) => cmd.run().await,
    }
}
