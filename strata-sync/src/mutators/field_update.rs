//! Force one nested leaf field to a constant across matching components.

use serde_json::{Map, Value};

use strata_core::{FieldUpdateRule, Section, SectionStore, Target, SYNC_KEY};

use crate::unit::{UnitOfWork, UnitOutcome};
use crate::SyncError;

/// Apply `rule` to every matching component in `sections`. Returns the number
/// of leaves that were absent or held a different value.
pub fn force_field(rule: &FieldUpdateRule, sections: &mut [Section]) -> usize {
    // A top-level `sync` leaf would collide with the correlation key.
    if rule.path.is_empty() && rule.field == SYNC_KEY {
        return 0;
    }
    let mut changed = 0;
    for section in sections {
        for component in &mut section.components {
            if rule.plugins.contains(&component.plugin) {
                changed += force_in_map(
                    &mut component.configuration.settings,
                    &rule.path,
                    &rule.field,
                    &rule.value,
                );
            }
        }
    }
    changed
}

fn force_in_map(map: &mut Map<String, Value>, path: &[String], field: &str, value: &Value) -> usize {
    match path.split_first() {
        None => {
            if map.get(field) == Some(value) {
                0
            } else {
                map.insert(field.to_string(), value.clone());
                1
            }
        }
        Some((head, rest)) => match map.get_mut(head) {
            Some(child) => force_in_value(child, rest, field, value),
            None => 0,
        },
    }
}

fn force_in_value(node: &mut Value, path: &[String], field: &str, value: &Value) -> usize {
    match node {
        Value::Array(items) => items
            .iter_mut()
            .map(|item| force_in_value(item, path, field, value))
            .sum(),
        Value::Object(map) => force_in_map(map, path, field, value),
        _ => 0,
    }
}

pub struct FieldUpdateWork {
    rule: FieldUpdateRule,
}

impl FieldUpdateWork {
    pub fn new(rule: FieldUpdateRule) -> Self {
        Self { rule }
    }
}

impl UnitOfWork for FieldUpdateWork {
    fn label(&self) -> &str {
        &self.rule.name
    }

    fn apply(&self, target: &mut Target, default: &[Section]) -> Result<UnitOutcome, SyncError> {
        let mut store = SectionStore::open(target, default)?;
        let mut sections = store.sections().to_vec();
        let changed = force_field(&self.rule, &mut sections);
        if changed > 0 {
            store.replace_sections(sections);
        }
        Ok(UnitOutcome {
            applied: changed > 0,
            persist: changed > 0,
            summary: format!("{changed} field(s) set"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_core::{Component, Configuration, Layout, PluginId, Settings, TargetId};

    fn rule() -> FieldUpdateRule {
        FieldUpdateRule {
            name: "grid-gutter".into(),
            plugins: vec![PluginId::from("grid")],
            path: vec!["rows".into(), "columns".into()],
            field: "gutter".into(),
            value: json!("none"),
        }
    }

    fn grid(config: serde_json::Value) -> Component {
        let settings: Settings = config.as_object().cloned().unwrap_or_default();
        Component::new(PluginId::from("grid"), "content", Configuration::new(settings))
    }

    #[test]
    fn walks_lists_along_the_path() {
        let mut section = Section::new(0);
        section.components.push(grid(json!({
            "rows": [
                {"columns": [{"gutter": "wide"}, {"gutter": "none"}]},
                {"columns": [{}]}
            ]
        })));
        let mut sections = vec![section];
        assert_eq!(force_field(&rule(), &mut sections), 2);
        let rows = &sections[0].components[0].configuration.settings["rows"];
        assert_eq!(rows[0]["columns"][0]["gutter"], json!("none"));
        assert_eq!(rows[1]["columns"][0]["gutter"], json!("none"));
        assert_eq!(force_field(&rule(), &mut sections), 0);
    }

    #[test]
    fn other_kinds_and_missing_paths_are_ignored() {
        let mut section = Section::new(0);
        let mut other = grid(json!({"rows": [{"columns": [{}]}]}));
        other.plugin = PluginId::from("text");
        section.components.push(other);
        section.components.push(grid(json!({"title": "no rows"})));
        let mut sections = vec![section];
        assert_eq!(force_field(&rule(), &mut sections), 0);
    }

    #[test]
    fn unchanged_target_is_not_forked() {
        let mut section = Section::new(0);
        section.components.push(grid(json!({"rows": []})));
        let defaults = vec![section];
        let mut target = Target::new(TargetId(1), "page", "Home");
        let outcome = FieldUpdateWork::new(rule())
            .apply(&mut target, &defaults)
            .expect("apply");
        assert!(!outcome.persist);
        assert_eq!(target.layout, Layout::Inherited);
    }
}
