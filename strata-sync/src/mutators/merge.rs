//! Collapse every section of a target into a single delta-0 section.

use strata_core::{Section, SectionStore, Target, PRIMARY_DELTA};

use crate::unit::{UnitOfWork, UnitOutcome};
use crate::SyncError;

/// Merge `sections` into one delta-0 section, or `None` when there is at most
/// one section already.
///
/// Components keep their relative order: by original delta ascending, then by
/// weight ascending (ties in insertion order). Weights are renumbered
/// `0..n-1`.
pub fn merge_sections(sections: &[Section]) -> Option<Section> {
    if sections.len() <= 1 {
        return None;
    }
    let mut by_delta: Vec<&Section> = sections.iter().collect();
    by_delta.sort_by_key(|s| s.delta);

    let mut merged = Section::new(PRIMARY_DELTA);
    for section in by_delta {
        merged
            .components
            .extend(section.ordered().into_iter().cloned());
    }
    for (weight, component) in merged.components.iter_mut().enumerate() {
        component.weight = weight as i64;
    }
    Some(merged)
}

pub struct MergeWork;

impl UnitOfWork for MergeWork {
    fn label(&self) -> &str {
        "merge"
    }

    fn apply(&self, target: &mut Target, default: &[Section]) -> Result<UnitOutcome, SyncError> {
        let mut store = SectionStore::open(target, default)?;
        let count = store.sections().len();
        let Some(merged) = merge_sections(store.sections()) else {
            return Ok(UnitOutcome {
                applied: false,
                persist: false,
                summary: format!("{count} section(s), nothing to merge"),
            });
        };
        let summary = format!(
            "merged {count} sections ({} components)",
            merged.components.len()
        );
        store.replace_sections(vec![merged]);
        Ok(UnitOutcome {
            applied: true,
            persist: true,
            summary,
        })
    }
}
