//! Reconcile a target's primary section against a remote element list.
//!
//! Components are correlated with remote elements through the
//! `sync.source_uuid` key of their configuration. Matching components are
//! updated in place (mapped keys win, hand-edited keys survive); unmatched
//! elements are appended; with `cleanup`, synced components of the processed
//! kinds that no longer appear remotely are removed. Components of other
//! kinds, and components that were never synced, are never touched.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use strata_core::{
    Component, Configuration, MapperRegistry, PluginId, Section, SectionStore, Target,
    PRIMARY_DELTA,
};

use crate::fetch::{RemoteElement, RemoteElementFetcher};
use crate::unit::{UnitOfWork, UnitOutcome};
use crate::SyncError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Kinds to process; `None` processes every registered kind.
    pub plugins: Option<Vec<PluginId>>,
    /// Only elements whose remote id is listed here are considered.
    pub element_ids: Option<BTreeSet<String>>,
    /// Remove synced components whose remote element has disappeared.
    pub cleanup: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Remote element types with no registered mapper, in encounter order.
    pub unknown_types: Vec<String>,
}

impl ReconcileOutcome {
    /// At least one remote element was processed.
    pub fn any_processed(&self) -> bool {
        self.processed > 0
    }

    pub fn mutated(&self) -> bool {
        self.processed > 0 || self.removed > 0
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} created, {} updated, {} removed",
            self.created, self.updated, self.removed
        );
        if !self.unknown_types.is_empty() {
            summary.push_str(&format!(", {} unknown skipped", self.unknown_types.len()));
        }
        summary
    }
}

pub struct Reconciler {
    registry: Arc<MapperRegistry>,
    region: String,
}

impl Reconciler {
    pub fn new(registry: Arc<MapperRegistry>) -> Self {
        Self {
            registry,
            region: "content".to_string(),
        }
    }

    /// Region assigned to newly created components.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    /// Upsert `elements` into the primary section and optionally prune.
    pub fn reconcile(
        &self,
        store: &mut SectionStore<'_>,
        elements: &[RemoteElement],
        options: &ReconcileOptions,
    ) -> Result<ReconcileOutcome, SyncError> {
        let selected: Vec<PluginId> = match &options.plugins {
            Some(plugins) => plugins.clone(),
            None => self.registry.plugins().cloned().collect(),
        };
        let mut outcome = ReconcileOutcome::default();
        let mut kept: HashSet<Uuid> = HashSet::new();

        if !elements.is_empty() {
            store.primary_section_mut();
        }

        for element in elements {
            if let Some(allowed) = &options.element_ids {
                if !allowed.contains(&element.id) {
                    tracing::debug!("element {} not in allow-list", element.id);
                    continue;
                }
            }
            let Some(mapper) = self.registry.for_source(&element.element_type) else {
                let skipped = SyncError::UnknownElementKind(element.element_type.clone());
                tracing::warn!("target {}: skipping element {}: {skipped}", store.target_id(), element.uuid);
                outcome.unknown_types.push(element.element_type.clone());
                continue;
            };
            let plugin = mapper.plugin_id();
            if !selected.contains(plugin) {
                continue;
            }

            let mapped = mapper.map_config(&element.configuration);
            let section = store.section_mut(PRIMARY_DELTA)?;
            match find_synced(section, plugin, &element.uuid) {
                Some(index) => {
                    let component = &mut section.components[index];
                    component.configuration.merge_from(mapped);
                    kept.insert(component.uuid);
                    outcome.updated += 1;
                }
                None => {
                    let component = Component::new(
                        plugin.clone(),
                        self.region.clone(),
                        Configuration::synced(mapped, element.uuid.clone()),
                    );
                    kept.insert(component.uuid);
                    store.append_component(PRIMARY_DELTA, component)?;
                    outcome.created += 1;
                }
            }
            outcome.processed += 1;
        }

        if options.cleanup {
            let stale: Vec<Uuid> = store
                .section(PRIMARY_DELTA)
                .map(|section| {
                    section
                        .components
                        .iter()
                        .filter(|c| {
                            selected.contains(&c.plugin)
                                && c.source_uuid().is_some()
                                && !kept.contains(&c.uuid)
                        })
                        .map(|c| c.uuid)
                        .collect()
                })
                .unwrap_or_default();
            for uuid in stale {
                if store.remove_component(PRIMARY_DELTA, uuid)?.is_some() {
                    tracing::debug!("target {}: pruned stale component {uuid}", store.target_id());
                    outcome.removed += 1;
                }
            }
        }

        Ok(outcome)
    }
}

/// Linear scan for the component of `plugin` correlated with `source_uuid`.
fn find_synced(section: &Section, plugin: &PluginId, source_uuid: &str) -> Option<usize> {
    section
        .components
        .iter()
        .position(|c| &c.plugin == plugin && c.source_uuid() == Some(source_uuid))
}

/// Fetch-then-reconcile as a batch unit of work.
pub struct ReconcileWork<F> {
    reconciler: Reconciler,
    fetcher: F,
    options: ReconcileOptions,
}

impl<F: RemoteElementFetcher> ReconcileWork<F> {
    pub fn new(reconciler: Reconciler, fetcher: F, options: ReconcileOptions) -> Self {
        Self {
            reconciler,
            fetcher,
            options,
        }
    }
}

impl<F: RemoteElementFetcher> UnitOfWork for ReconcileWork<F> {
    fn label(&self) -> &str {
        "reconcile"
    }

    fn apply(&self, target: &mut Target, default: &[Section]) -> Result<UnitOutcome, SyncError> {
        let id = target.id;
        let source_key = target.source_key.clone();
        let mut store = SectionStore::open(target, default)?;

        // Fetch failures abort before any mutation.
        let source_key = source_key.ok_or(SyncError::SourceUnavailable {
            target: id,
            source: crate::FetchError::NotConfigured,
        })?;
        let elements = self
            .fetcher
            .fetch(&source_key)
            .map_err(|source| SyncError::SourceUnavailable { target: id, source })?;
        tracing::debug!("target {id}: fetched {} remote element(s)", elements.len());

        let outcome = self.reconciler.reconcile(&mut store, &elements, &self.options)?;
        Ok(UnitOutcome {
            applied: outcome.any_processed(),
            persist: outcome.mutated(),
            summary: outcome.summary(),
        })
    }
}
