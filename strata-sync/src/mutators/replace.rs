//! Swap components of deprecated kinds for their successors in place.
//!
//! The successor gets a fresh identity but inherits weight, region and ordinal
//! position. Revisionable targets have their stored revisions rewritten too,
//! each one independently.

use std::sync::Arc;

use uuid::Uuid;

use strata_core::{
    Component, Layout, MapperRegistry, PluginId, Section, SectionStore, Target,
};

use crate::unit::{UnitOfWork, UnitOutcome};
use crate::SyncError;

/// One planned swap within a section.
struct Swap {
    delta: u32,
    old: Uuid,
    replacement: Component,
}

fn plan(registry: &MapperRegistry, plugins: &[PluginId], sections: &[Section]) -> Vec<Swap> {
    let mut swaps = Vec::new();
    for section in sections {
        for component in &section.components {
            if !plugins.contains(&component.plugin) {
                continue;
            }
            let Some(provider) = registry.replacement_for(&component.plugin) else {
                continue;
            };
            let Some(replacement) = provider.replacement(component) else {
                tracing::debug!(
                    "component {} ({}) has no replacement",
                    component.uuid,
                    component.plugin
                );
                continue;
            };
            swaps.push(Swap {
                delta: section.delta,
                old: component.uuid,
                replacement: Component {
                    uuid: Uuid::new_v4(),
                    region: component.region.clone(),
                    weight: component.weight,
                    plugin: replacement.plugin,
                    configuration: replacement.configuration,
                },
            });
        }
    }
    swaps
}

/// Replace deprecated components directly in `sections`. Returns the number
/// of components swapped.
pub fn replace_deprecated(
    registry: &MapperRegistry,
    plugins: &[PluginId],
    sections: &mut [Section],
) -> usize {
    let swaps = plan(registry, plugins, sections);
    let mut swapped = 0;
    for swap in swaps {
        let section = sections.iter_mut().find(|s| s.delta == swap.delta);
        if let Some(section) = section {
            if section.replace_at(swap.old, swap.replacement).is_some() {
                swapped += 1;
            }
        }
    }
    swapped
}

pub struct ReplaceWork {
    registry: Arc<MapperRegistry>,
    plugins: Vec<PluginId>,
}

impl ReplaceWork {
    /// `plugins` restricts which deprecated kinds are replaced; `None` means
    /// every kind that has a registered provider.
    pub fn new(registry: Arc<MapperRegistry>, plugins: Option<Vec<PluginId>>) -> Self {
        let plugins = plugins
            .unwrap_or_else(|| registry.deprecated_plugins().into_iter().cloned().collect());
        Self { registry, plugins }
    }
}

impl UnitOfWork for ReplaceWork {
    fn label(&self) -> &str {
        "replace"
    }

    fn apply(&self, target: &mut Target, default: &[Section]) -> Result<UnitOutcome, SyncError> {
        let mut revisions_touched = 0;
        if target.revisionable && !matches!(target.layout, Layout::Absent) {
            for revision in &mut target.revisions {
                if let Layout::Overridden(sections) = &mut revision.layout {
                    if replace_deprecated(&self.registry, &self.plugins, sections) > 0 {
                        revisions_touched += 1;
                    }
                }
            }
        }

        let mut store = SectionStore::open(target, default)?;
        let swaps = plan(&self.registry, &self.plugins, store.sections());
        let replaced = swaps.len();
        for swap in swaps {
            store.replace_at_position(swap.delta, swap.old, swap.replacement)?;
        }

        let mut summary = format!("replaced {replaced} component(s)");
        if revisions_touched > 0 {
            summary.push_str(&format!(" and rewrote {revisions_touched} revision(s)"));
        }
        Ok(UnitOutcome {
            applied: replaced > 0,
            persist: replaced > 0 || revisions_touched > 0,
            summary,
        })
    }
}
