//! Dry-run unified diff of a target's sections.

use similar::TextDiff;

use strata_core::{Section, TargetId};

use crate::SyncError;

/// Unified diff between the YAML renderings of `before` and `after`, or
/// `None` when they render identically.
pub fn diff_sections(
    target: TargetId,
    before: &[Section],
    after: &[Section],
) -> Result<Option<String>, SyncError> {
    let old = serde_yaml::to_string(before)?;
    let new = serde_yaml::to_string(after)?;
    if old == new {
        return Ok(None);
    }
    let old_header = format!("a/targets/{target}.yaml");
    let new_header = format!("b/targets/{target}.yaml");
    let unified = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    Ok(Some(unified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Component, Configuration, PluginId};

    #[test]
    fn no_diff_for_identical_sections() {
        let sections = vec![Section::new(0)];
        assert!(diff_sections(TargetId(1), &sections, &sections)
            .expect("diff")
            .is_none());
    }

    #[test]
    fn added_component_shows_in_unified_diff() {
        let before = vec![Section::new(0)];
        let mut after = before.clone();
        after[0].components.push(Component::new(
            PluginId::from("inline_text"),
            "content",
            Configuration::default(),
        ));
        let diff = diff_sections(TargetId(3), &before, &after)
            .expect("diff")
            .expect("some diff");
        assert!(diff.contains("--- a/targets/3.yaml"));
        assert!(diff.contains("+++ b/targets/3.yaml"));
        assert!(
            diff.lines()
                .any(|l| l.starts_with('+') && l.contains("plugin: inline_text")),
            "got: {diff}"
        );
    }
}
