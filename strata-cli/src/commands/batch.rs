//! `strata batch reconcile|merge|replace|update-fields`

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use colored::Colorize;

use strata_core::{config, FileRepository, PluginId, TargetId};
use strata_sync::{
    pipeline::{self, Operation, SourceOverride},
    BatchReport, BatchRequest, Limit, Progress, ReconcileOptions, TargetStatus,
};

/// Run a unit of work over a set of targets.
#[derive(Subcommand, Debug)]
pub enum BatchCommand {
    /// Upsert remote elements into each target's primary section.
    Reconcile(ReconcileArgs),

    /// Collapse all sections of each target into one.
    Merge(CommonArgs),

    /// Swap deprecated component kinds for their successors.
    Replace(ReplaceArgs),

    /// Apply a named field update rule from config.yaml.
    UpdateFields(UpdateFieldsArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LimitArg {
    None,
    Bundle,
    Id,
}

/// Options shared by every batch operation.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Candidate restriction; inferred from --bundle / --id when omitted.
    #[arg(long, value_enum)]
    pub limit: Option<LimitArg>,

    /// Bundle to include (repeatable).
    #[arg(long = "bundle", short = 'b')]
    pub bundles: Vec<String>,

    /// Target id to include (repeatable).
    #[arg(long = "id")]
    pub ids: Vec<u64>,

    /// Record a revision for every target that is written.
    #[arg(long)]
    pub create_revisions: bool,

    /// Compute changes without writing any target.
    #[arg(long)]
    pub dry_run: bool,

    /// Print a unified diff for every changed target.
    #[arg(long)]
    pub diff: bool,
}

impl CommonArgs {
    fn request(&self) -> BatchRequest {
        let limit = match self.limit {
            Some(LimitArg::None) => Limit::None,
            Some(LimitArg::Bundle) => Limit::Bundle,
            Some(LimitArg::Id) => Limit::Id,
            None if !self.ids.is_empty() => Limit::Id,
            None if !self.bundles.is_empty() => Limit::Bundle,
            None => Limit::None,
        };
        BatchRequest {
            limit,
            bundles: self.bundles.clone(),
            ids: self.ids.iter().copied().map(TargetId).collect(),
            create_revisions: self.create_revisions,
            dry_run: self.dry_run,
            capture_diff: self.diff,
        }
    }
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Remove synced components whose remote element is gone.
    #[arg(long)]
    pub cleanup: bool,

    /// Only process this component kind (repeatable; default: all configured kinds).
    #[arg(long = "kind", short = 'k')]
    pub kinds: Vec<String>,

    /// Only process the remote element with this id (repeatable).
    #[arg(long = "element", short = 'e')]
    pub elements: Vec<String>,

    /// Read `<key>.json` payloads from this directory instead of the configured source.
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReplaceArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Only replace this deprecated kind (repeatable; default: every configured replacement).
    #[arg(long = "kind", short = 'k')]
    pub kinds: Vec<String>,
}

#[derive(Args, Debug)]
pub struct UpdateFieldsArgs {
    /// Name of a rule under `field_updates` in config.yaml.
    pub rule: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

fn plugin_list(kinds: Vec<String>) -> Option<Vec<PluginId>> {
    if kinds.is_empty() {
        None
    } else {
        Some(kinds.into_iter().map(PluginId::from).collect())
    }
}

pub fn run(cmd: BatchCommand) -> Result<()> {
    let (operation, source, common) = match cmd {
        BatchCommand::Reconcile(args) => {
            let options = ReconcileOptions {
                plugins: plugin_list(args.kinds),
                element_ids: if args.elements.is_empty() {
                    None
                } else {
                    Some(args.elements.into_iter().collect::<BTreeSet<_>>())
                },
                cleanup: args.cleanup,
            };
            let source = match args.source_dir {
                Some(dir) => SourceOverride::Directory(dir),
                None => SourceOverride::Configured,
            };
            (Operation::Reconcile(options), source, args.common)
        }
        BatchCommand::Merge(common) => (Operation::Merge, SourceOverride::Configured, common),
        BatchCommand::Replace(args) => (
            Operation::Replace {
                plugins: plugin_list(args.kinds),
            },
            SourceOverride::Configured,
            args.common,
        ),
        BatchCommand::UpdateFields(args) => (
            Operation::UpdateFields { rule: args.rule },
            SourceOverride::Configured,
            args.common,
        ),
    };

    let home = super::home()?;
    let config = config::load_at(&home).context("failed to load config; run `strata init` first")?;
    let mut repo = FileRepository::at(&home);
    let request = common.request();
    let dry_run = request.dry_run;

    let report = pipeline::run(&mut repo, &config, &operation, &source, request, |progress| {
        print_progress(progress, dry_run)
    })
    .context("batch failed")?;

    print_summary(&report, dry_run);
    Ok(())
}

fn status_label(status: TargetStatus) -> String {
    match status {
        TargetStatus::Updated => status.to_string().green().to_string(),
        TargetStatus::WouldUpdate => status.to_string().yellow().to_string(),
        TargetStatus::Unchanged | TargetStatus::NotApplicable => {
            status.to_string().bright_black().to_string()
        }
    }
}

fn print_progress(progress: &Progress, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let counter = format!("[{}/{}]", progress.done, progress.total);
    match (&progress.report, &progress.error) {
        (Some(report), _) => {
            let mut line = format!(
                "{prefix}{counter} target {}: {}",
                report.target,
                status_label(report.status)
            );
            if !report.summary.is_empty() {
                line.push_str(&format!(" ({})", report.summary));
            }
            if let Some(revision) = report.revision {
                line.push_str(&format!(" revision {revision}"));
            }
            println!("{line}");
            for warning in &report.warnings {
                println!("  {} {warning}", "warning:".yellow());
            }
            if let Some(diff) = &report.diff {
                print!("{diff}");
            }
        }
        (None, Some(error)) => println!("{prefix}{counter} {}", error.red()),
        (None, None) => println!("{prefix}{counter} target {}", progress.target),
    }
}

fn print_summary(report: &BatchReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    if report.total == 0 {
        println!("{prefix}No matching targets.");
        return;
    }
    if report.completed_with_warnings() {
        println!(
            "{prefix}{} {}",
            "completed with warnings:".yellow().bold(),
            report.summary()
        );
        for error in &report.errors {
            println!("  ✗ {error}");
        }
        for target in report.reports.iter().filter(|r| !r.warnings.is_empty()) {
            for warning in &target.warnings {
                println!("  ! target {}: {warning}", target.target);
            }
        }
    } else {
        println!("{prefix}{} {}", "✓ completed:".green(), report.summary());
    }
}
