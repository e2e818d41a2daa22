//! AutoSmoke CLI - Main Entry Point
//!
//! Discovers routes, smoke-tests them in a real browser, audits them with
//! Lighthouse, and turns captured evidence into proposed test steps.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use autosmoke_cli::commands::{batch, dev, lighthouse, propose, routes, run};
use autosmoke_cli::output::{self, print_error};
use autosmoke_common::RunnerConfig;

/// AutoSmoke - zero-config smoke tests for web apps
#[derive(Parser)]
#[command(name = "autosmoke")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the routes discovered in the project
    Routes(routes::RoutesArgs),

    /// Propose test steps from one evidence file
    Propose(propose::ProposeArgs),

    /// Propose test steps for every evidence file in a directory
    Batch(batch::BatchArgs),

    /// Smoke-test every discovered route once
    Run(run::RunArgs),

    /// Start the app and re-run smoke tests as routes change
    Dev(dev::DevArgs),

    /// Run Lighthouse audits on discovered routes
    Lighthouse,
}

fn settings() -> Result<RunnerConfig> {
    RunnerConfig::from_env().context("Invalid environment configuration")
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Routes(args) => routes::execute(args, &settings()?, cli.format),
        Commands::Propose(args) => propose::execute(args),
        Commands::Batch(args) => batch::execute(args),
        Commands::Run(args) => run::execute(args, &settings()?, cli.format).await,
        Commands::Dev(args) => dev::execute(args, &settings()?, cli.format).await,
        Commands::Lighthouse => lighthouse::execute(&settings()?, cli.format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays clean
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dispatch(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
