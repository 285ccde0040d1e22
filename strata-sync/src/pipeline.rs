//! Shared batch entrypoint used by the CLI.
//!
//! Turns an [`Operation`] plus the loaded configuration into a unit of work
//! and drives it through a [`BatchRunner`].

use std::path::PathBuf;
use std::sync::Arc;

use strata_core::{Config, MapperRegistry, PluginId, StoreError, TargetRepository, SYNC_KEY};

use crate::batch::{BatchReport, BatchRequest, BatchRunner, Progress};
use crate::fetch::{DirectoryFetcher, HttpFetcher, RemoteElementFetcher, UnconfiguredFetcher};
use crate::mutators::{FieldUpdateWork, MergeWork, ReplaceWork};
use crate::reconciler::{ReconcileOptions, ReconcileWork, Reconciler};
use crate::unit::UnitOfWork;
use crate::SyncError;

/// What a batch does to each target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Reconcile(ReconcileOptions),
    Merge,
    Replace { plugins: Option<Vec<PluginId>> },
    UpdateFields { rule: String },
}

/// Where reconciliation reads remote elements from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceOverride {
    /// The `source` section of the configuration, if any.
    #[default]
    Configured,
    /// Exported payloads under a local directory.
    Directory(PathBuf),
}

pub fn fetcher_for(config: &Config, source: &SourceOverride) -> Box<dyn RemoteElementFetcher> {
    match (source, &config.source) {
        (SourceOverride::Directory(root), _) => Box::new(DirectoryFetcher::new(root.clone())),
        (SourceOverride::Configured, Some(source)) => Box::new(HttpFetcher::new(source)),
        (SourceOverride::Configured, None) => Box::new(UnconfiguredFetcher),
    }
}

/// Build the unit of work for `operation`.
pub fn build_unit(
    operation: &Operation,
    config: &Config,
    registry: Arc<MapperRegistry>,
    fetcher: Box<dyn RemoteElementFetcher>,
) -> Result<Box<dyn UnitOfWork>, SyncError> {
    Ok(match operation {
        Operation::Reconcile(options) => {
            for plugin in options.plugins.iter().flatten() {
                if registry.for_plugin(plugin).is_none() {
                    return Err(StoreError::UnknownPlugin(plugin.clone()).into());
                }
            }
            let reconciler = Reconciler::new(registry).with_region(config.default_region.clone());
            Box::new(ReconcileWork::new(reconciler, fetcher, options.clone()))
        }
        Operation::Merge => Box::new(MergeWork),
        Operation::Replace { plugins } => {
            for plugin in plugins.iter().flatten() {
                if registry.replacement_for(plugin).is_none() {
                    return Err(StoreError::UnknownPlugin(plugin.clone()).into());
                }
            }
            Box::new(ReplaceWork::new(registry, plugins.clone()))
        }
        Operation::UpdateFields { rule } => {
            let rule = config
                .field_update(rule)
                .cloned()
                .ok_or_else(|| SyncError::UnknownRule(rule.clone()))?;
            if rule.path.is_empty() && rule.field == SYNC_KEY {
                return Err(StoreError::ReservedKey { owner: rule.name }.into());
            }
            Box::new(FieldUpdateWork::new(rule))
        }
    })
}

/// Run `operation` over the targets selected by `request`.
pub fn run(
    repo: &mut dyn TargetRepository,
    config: &Config,
    operation: &Operation,
    source: &SourceOverride,
    request: BatchRequest,
    on_progress: impl FnMut(&Progress),
) -> Result<BatchReport, SyncError> {
    let registry = Arc::new(MapperRegistry::from_config(config)?);
    let unit = build_unit(operation, config, registry, fetcher_for(config, source))?;
    BatchRunner::new(repo, unit, request).run(on_progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{mapper::RenameReplacement, FieldUpdateRule, MemoryRepository};

    #[test]
    fn unknown_field_rule_is_rejected_up_front() {
        let config = Config::default();
        let mut repo = MemoryRepository::new();
        let err = run(
            &mut repo,
            &config,
            &Operation::UpdateFields {
                rule: "missing".into(),
            },
            &SourceOverride::Configured,
            BatchRequest::default(),
            |_| {},
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::UnknownRule(ref name) if name == "missing"));
    }

    #[test]
    fn unregistered_kind_selection_is_rejected() {
        let config = Config::default();
        let operation = Operation::Reconcile(ReconcileOptions {
            plugins: Some(vec![PluginId::from("carousel")]),
            ..ReconcileOptions::default()
        });
        let err = build_unit(
            &operation,
            &config,
            Arc::new(MapperRegistry::new()),
            Box::new(UnconfiguredFetcher),
        )
        .err()
        .expect("error");
        assert!(matches!(
            err,
            SyncError::Store(StoreError::UnknownPlugin(ref p)) if p.0 == "carousel"
        ));
    }

    #[test]
    fn unregistered_replacement_kind_is_rejected() {
        let mut registry = MapperRegistry::new();
        registry
            .register_replacement(Box::new(RenameReplacement::new("old_card", "card")))
            .expect("register");
        let registry = Arc::new(registry);
        let config = Config::default();

        let typo = Operation::Replace {
            plugins: Some(vec![PluginId::from("old_crad")]),
        };
        let err = build_unit(&typo, &config, registry.clone(), Box::new(UnconfiguredFetcher))
            .err()
            .expect("error");
        assert!(matches!(
            err,
            SyncError::Store(StoreError::UnknownPlugin(ref p)) if p.0 == "old_crad"
        ));

        let known = Operation::Replace {
            plugins: Some(vec![PluginId::from("old_card")]),
        };
        assert!(build_unit(&known, &config, registry, Box::new(UnconfiguredFetcher)).is_ok());
    }

    #[test]
    fn field_rule_onto_sync_is_rejected() {
        let config = Config {
            field_updates: vec![FieldUpdateRule {
                name: "clobber".into(),
                plugins: vec![PluginId::from("inline_text")],
                path: vec![],
                field: "sync".into(),
                value: serde_json::json!("x"),
            }],
            ..Config::default()
        };
        let err = build_unit(
            &Operation::UpdateFields {
                rule: "clobber".into(),
            },
            &config,
            Arc::new(MapperRegistry::new()),
            Box::new(UnconfiguredFetcher),
        )
        .err()
        .expect("error");
        assert!(matches!(
            err,
            SyncError::Store(StoreError::ReservedKey { ref owner }) if owner == "clobber"
        ));
    }

    #[test]
    fn empty_repository_yields_empty_report() {
        let config = Config::default();
        let mut repo = MemoryRepository::new();
        let report = run(
            &mut repo,
            &config,
            &Operation::Merge,
            &SourceOverride::Configured,
            BatchRequest::default(),
            |_| {},
        )
        .expect("run");
        assert_eq!(report.total, 0);
    }
}
