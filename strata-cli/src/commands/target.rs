//! `strata target list` and `strata target show <id>`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use strata_core::{FileRepository, Layout, Target, TargetFilter, TargetId, TargetRepository};

/// Inspect stored targets.
#[derive(Subcommand, Debug)]
pub enum TargetCommand {
    /// List targets, optionally restricted to some bundles.
    List(ListArgs),

    /// Show the effective sections and components of one target.
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list targets of this bundle (repeatable).
    #[arg(long = "bundle", short = 'b')]
    pub bundles: Vec<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: u64,
}

pub fn run(cmd: TargetCommand) -> Result<()> {
    let repo = FileRepository::at(&super::home()?);
    match cmd {
        TargetCommand::List(args) => list(&repo, args),
        TargetCommand::Show(args) => show(&repo, TargetId(args.id)),
    }
}

#[derive(Serialize, Tabled)]
struct TargetRow {
    #[tabled(rename = "id")]
    id: u64,
    #[tabled(rename = "bundle")]
    bundle: String,
    #[tabled(rename = "label")]
    label: String,
    #[tabled(rename = "layout")]
    layout: String,
    #[tabled(rename = "sections")]
    sections: usize,
    #[tabled(rename = "components")]
    components: usize,
    #[tabled(rename = "revisions")]
    revisions: usize,
    #[tabled(rename = "updated")]
    updated: String,
}

fn layout_mode(layout: &Layout) -> &'static str {
    match layout {
        Layout::Absent => "absent",
        Layout::Inherited => "inherited",
        Layout::Overridden(_) => "overridden",
    }
}

fn row(repo: &FileRepository, target: &Target) -> Result<TargetRow> {
    let default = repo
        .default_layout(&target.bundle)
        .with_context(|| format!("failed to load default layout for bundle '{}'", target.bundle))?;
    let sections = target.layout.resolve(&default);
    Ok(TargetRow {
        id: target.id.0,
        bundle: target.bundle.clone(),
        label: target.label.clone(),
        layout: layout_mode(&target.layout).to_string(),
        sections: sections.len(),
        components: sections.iter().map(|s| s.components.len()).sum(),
        revisions: target.revisions.len(),
        updated: target.updated_at.format("%Y-%m-%d %H:%M").to_string(),
    })
}

fn list(repo: &FileRepository, args: ListArgs) -> Result<()> {
    let filter = if args.bundles.is_empty() {
        TargetFilter::All
    } else {
        TargetFilter::Bundles(args.bundles)
    };
    let ids = repo
        .candidate_ids(&filter)
        .context("failed to list targets")?;

    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let target = repo
            .load(id)
            .with_context(|| format!("failed to load target {id}"))?;
        rows.push(row(repo, &target)?);
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("failed to serialize target list")?
        );
        return Ok(());
    }

    if rows.is_empty() {
        println!("No targets found.");
        return Ok(());
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "delta")]
    delta: u32,
    #[tabled(rename = "weight")]
    weight: i64,
    #[tabled(rename = "plugin")]
    plugin: String,
    #[tabled(rename = "region")]
    region: String,
    #[tabled(rename = "uuid")]
    uuid: String,
    #[tabled(rename = "source")]
    source: String,
}

fn show(repo: &FileRepository, id: TargetId) -> Result<()> {
    let target = repo
        .load(id)
        .with_context(|| format!("failed to load target {id}"))?;
    let default = repo
        .default_layout(&target.bundle)
        .with_context(|| format!("failed to load default layout for bundle '{}'", target.bundle))?;

    println!(
        "{} {} ({}) | layout: {} | revisions: {}",
        format!("#{}", target.id).bold(),
        target.label,
        target.bundle,
        layout_mode(&target.layout),
        target.revisions.len(),
    );
    if let Some(key) = &target.source_key {
        println!("source key: {key}");
    }

    let rows: Vec<ComponentRow> = target
        .layout
        .resolve(&default)
        .iter()
        .flat_map(|section| {
            section.ordered().into_iter().map(move |c| ComponentRow {
                delta: section.delta,
                weight: c.weight,
                plugin: c.plugin.to_string(),
                region: c.region.clone(),
                uuid: c.uuid.to_string(),
                source: c.source_uuid().unwrap_or("-").to_string(),
            })
        })
        .collect();

    if rows.is_empty() {
        println!("{}", "no components".bright_black());
        return Ok(());
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
