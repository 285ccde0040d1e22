//! Strata: component layout reconciliation and batch mutation CLI.
//!
//! # Usage
//!
//! ```text
//! strata init
//! strata target list [--bundle <bundle>] [--json]
//! strata target show <id>
//! strata batch reconcile [--cleanup] [--kind <plugin>]... [--element <id>]... [--source-dir <dir>]
//! strata batch merge
//! strata batch replace [--kind <plugin>]...
//! strata batch update-fields <rule>
//! ```
//!
//! Every `batch` subcommand also takes `--limit none|bundle|id`, `--bundle`,
//! `--id`, `--create-revisions`, `--dry-run` and `--diff`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{batch::BatchCommand, init::InitArgs, target::TargetCommand};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Reconcile and batch-edit component layouts",
    long_about = None,
)]
struct Cli {
    /// Log progress at info level (overridden by RUST_LOG).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create ~/.strata/config.yaml if it does not exist yet.
    Init(InitArgs),

    /// Inspect stored targets.
    Target {
        #[command(subcommand)]
        command: TargetCommand,
    },

    /// Run a unit of work over a set of targets.
    Batch {
        #[command(subcommand)]
        command: BatchCommand,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Target { command } => commands::target::run(command),
        Commands::Batch { command } => commands::batch::run(command),
    }
}
