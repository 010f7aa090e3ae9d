//! Tessera schema reconciliation CLI.
//!
//! Three commands over one data root:
//! - `discover`: list the schema definitions found under the root
//! - `validate`: diff declared schemas against a live database, no writes
//! - `reconcile`: apply additive migrations and write the audit trail

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "tessera", about = "Declarative schema reconciliation for SQLite")]
struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List schema definitions discovered under the data root
    Discover(cli::discover::DiscoverArgs),

    /// Validate declared schemas against the live database (read-only)
    Validate(cli::validate::ValidateArgs),

    /// Apply additive migrations so the database matches the definitions
    Reconcile(cli::reconcile::ReconcileArgs),
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Discover(args) => args.json,
        Commands::Validate(args) => args.json,
        Commands::Reconcile(args) => args.json,
    }
}

async fn run_command(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Discover(args) => cli::discover::run(args),
        Commands::Validate(args) => cli::validate::run(args).await,
        Commands::Reconcile(args) => cli::reconcile::run(args).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "tessera=debug,tessera_schema=debug,tessera_db=debug,tessera_audit=debug"
    } else {
        "tessera=info,tessera_schema=info,tessera_db=info,tessera_audit=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    // JSON output goes to stdout, so logs move to stderr to keep it parseable.
    let log_to_stderr = command_wants_json(&cli.command);
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    if log_to_stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }

    match run_command(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}
