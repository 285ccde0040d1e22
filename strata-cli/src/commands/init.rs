//! `strata init`

use anyhow::{Context, Result};
use clap::Args;

use strata_core::config;

/// Scaffold `~/.strata/config.yaml`.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let path = config::config_path_at(&home);
        let (config, created) = config::init_at(&home)
            .with_context(|| format!("failed to initialize {}", path.display()))?;

        if created {
            println!("✓ Created {}", path.display());
            println!("  Add a `source` and your component `kinds`, then run `strata batch reconcile`.");
        } else {
            println!(
                "· {} already exists ({} kind(s), {} replacement(s), {} field update(s))",
                path.display(),
                config.kinds.len(),
                config.replacements.len(),
                config.field_updates.len(),
            );
        }
        Ok(())
    }
}
