//! Domain types for Strata layouts.
//!
//! A [`Target`] owns a [`Layout`]: either nothing at all, the bundle's shared
//! default, or a private list of [`Section`]s. Each section holds an ordered
//! list of [`Component`]s whose [`Configuration`] is opaque apart from the
//! `sync.source_uuid` correlation key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Opaque configuration payload. The engine never interprets these keys
/// except through a mapper or an explicit field-update rule.
pub type Settings = Map<String, Value>;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Numeric identifier of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for TargetId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier of a component kind (the plugin that renders it).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PluginId(pub String);

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PluginId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PluginId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration key that holds [`SyncMeta`]. Never a settings key.
pub const SYNC_KEY: &str = "sync";

/// Sync bookkeeping stored under the `sync` key of a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    pub source_uuid: String,
}

/// Component configuration: the correlation key plus an opaque remainder.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncMeta>,
    #[serde(flatten)]
    pub settings: Settings,
}

impl Configuration {
    pub fn new(mut settings: Settings) -> Self {
        settings.remove(SYNC_KEY);
        Self {
            sync: None,
            settings,
        }
    }

    /// Configuration stamped with a correlation key.
    pub fn synced(mut settings: Settings, source_uuid: impl Into<String>) -> Self {
        settings.remove(SYNC_KEY);
        Self {
            sync: Some(SyncMeta {
                source_uuid: source_uuid.into(),
            }),
            settings,
        }
    }

    pub fn source_uuid(&self) -> Option<&str> {
        self.sync.as_ref().map(|s| s.source_uuid.as_str())
    }

    /// Overlay `fragment` onto the current settings. Keys present in the
    /// fragment win; keys only present here are kept. The correlation key is
    /// never touched.
    pub fn merge_from(&mut self, fragment: Settings) {
        for (key, value) in fragment {
            if key != SYNC_KEY {
                self.settings.insert(key, value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Components and sections
// ---------------------------------------------------------------------------

/// A placed, weighted, typed unit of content within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub uuid: Uuid,
    pub region: String,
    pub weight: i64,
    pub plugin: PluginId,
    #[serde(default)]
    pub configuration: Configuration,
}

impl Component {
    /// A component with a fresh identity and weight 0.
    pub fn new(plugin: PluginId, region: impl Into<String>, configuration: Configuration) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            region: region.into(),
            weight: 0,
            plugin,
            configuration,
        }
    }

    pub fn source_uuid(&self) -> Option<&str> {
        self.configuration.source_uuid()
    }
}

/// An ordered container of components, keyed by `delta` within its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub delta: u32,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl Section {
    pub fn new(delta: u32) -> Self {
        Self {
            delta,
            components: Vec::new(),
        }
    }

    /// Ordinal index of the component with `uuid`.
    pub fn position(&self, uuid: Uuid) -> Option<usize> {
        self.components.iter().position(|c| c.uuid == uuid)
    }

    /// The weight a newly appended component receives, or `None` when the
    /// heaviest component already sits at `i64::MAX`.
    pub fn next_weight(&self) -> Option<i64> {
        match self.components.iter().map(|c| c.weight).max() {
            Some(heaviest) => heaviest.checked_add(1),
            None => Some(0),
        }
    }

    /// Components in render order: weight ascending, ties by insertion order.
    pub fn ordered(&self) -> Vec<&Component> {
        let mut ordered: Vec<&Component> = self.components.iter().collect();
        ordered.sort_by_key(|c| c.weight);
        ordered
    }

    /// Swap the component identified by `old` for `replacement`, keeping its
    /// ordinal index. Returns the removed component.
    pub fn replace_at(&mut self, old: Uuid, replacement: Component) -> Option<Component> {
        let index = self.position(old)?;
        Some(std::mem::replace(&mut self.components[index], replacement))
    }

    /// Reorder into render order and assign weights `0..n-1`.
    pub fn renumber(&mut self) {
        self.components.sort_by_key(|c| c.weight);
        for (weight, component) in self.components.iter_mut().enumerate() {
            component.weight = weight as i64;
        }
    }
}

// ---------------------------------------------------------------------------
// Targets and revisions
// ---------------------------------------------------------------------------

/// How a target holds its component collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", content = "sections", rename_all = "snake_case")]
pub enum Layout {
    /// The bundle has no component collection attribute.
    Absent,
    /// Shares the bundle's read-only default sections.
    #[default]
    Inherited,
    /// A private, target-owned copy.
    Overridden(Vec<Section>),
}

impl Layout {
    /// Effective sections, resolving `Inherited` against the bundle default.
    pub fn resolve<'a>(&'a self, default: &'a [Section]) -> &'a [Section] {
        match self {
            Layout::Absent => &[],
            Layout::Inherited => default,
            Layout::Overridden(sections) => sections,
        }
    }
}

/// Immutable historical snapshot of a target's layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: u64,
    pub layout: Layout,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// A content item whose component collection is reconciled or mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub bundle: String,
    pub label: String,
    /// Key under which the remote source publishes this target's elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    #[serde(default)]
    pub revisionable: bool,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub revisions: Vec<Revision>,
    pub updated_at: DateTime<Utc>,
}

impl Target {
    pub fn new(id: TargetId, bundle: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id,
            bundle: bundle.into(),
            label: label.into(),
            source_key: None,
            revisionable: false,
            layout: Layout::Inherited,
            revisions: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Append a revision snapshotting the current layout. Returns `None` for
    /// targets that are not revisionable.
    pub fn push_revision(&mut self, message: impl Into<String>) -> Option<u64> {
        if !self.revisionable {
            return None;
        }
        let id = self.revisions.last().map(|r| r.id + 1).unwrap_or(1);
        self.revisions.push(Revision {
            id,
            layout: self.layout.clone(),
            message: message.into(),
            created_at: Utc::now(),
        });
        Some(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: serde_json::Value) -> Settings {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn newtype_display() {
        assert_eq!(TargetId::from(42).to_string(), "42");
        assert_eq!(PluginId::from("text").to_string(), "text");
    }

    #[test]
    fn configuration_yaml_keeps_sync_key_nested() {
        let config = Configuration::synced(settings(json!({"title": "Hi"})), "abc");
        let yaml = serde_yaml::to_string(&config).expect("serialize");
        assert!(yaml.contains("source_uuid: abc"), "got: {yaml}");
        let back: Configuration = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(back.source_uuid(), Some("abc"));
        assert_eq!(back.settings.get("title"), Some(&json!("Hi")));
    }

    #[test]
    fn merge_prefers_fragment_and_keeps_unmapped_keys() {
        let mut config = Configuration::synced(
            settings(json!({"title": "old", "css_class": "hand-edited"})),
            "u1",
        );
        config.merge_from(settings(json!({"title": "new", "body": "text"})));
        assert_eq!(config.settings.get("title"), Some(&json!("new")));
        assert_eq!(config.settings.get("css_class"), Some(&json!("hand-edited")));
        assert_eq!(config.settings.get("body"), Some(&json!("text")));
        assert_eq!(config.source_uuid(), Some("u1"));
    }

    #[test]
    fn next_weight_follows_highest() {
        let mut section = Section::new(0);
        assert_eq!(section.next_weight(), Some(0));
        let mut c = Component::new(PluginId::from("text"), "content", Configuration::default());
        c.weight = 4;
        section.components.push(c);
        assert_eq!(section.next_weight(), Some(5));
    }

    #[test]
    fn next_weight_is_none_past_the_maximum() {
        let mut section = Section::new(0);
        let mut c = Component::new(PluginId::from("text"), "content", Configuration::default());
        c.weight = i64::MAX;
        section.components.push(c);
        assert_eq!(section.next_weight(), None);
    }

    #[test]
    fn sync_key_never_lands_in_settings() {
        let mut config = Configuration::synced(settings(json!({"sync": "x", "title": "Hi"})), "a");
        assert!(!config.settings.contains_key(SYNC_KEY));
        config.merge_from(settings(json!({"sync": "y", "body": "text"})));
        assert!(!config.settings.contains_key(SYNC_KEY));
        assert_eq!(config.settings.get("body"), Some(&json!("text")));

        let yaml = serde_yaml::to_string(&config).expect("serialize");
        assert_eq!(yaml.matches("sync:").count(), 1, "got: {yaml}");
        let back: Configuration = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(back, config);
        assert!(Configuration::new(settings(json!({"sync": 1}))).settings.is_empty());
    }

    #[test]
    fn renumber_is_stable_on_ties() {
        let mut section = Section::new(0);
        for (name, weight) in [("a", 3), ("b", 1), ("c", 3)] {
            let mut c = Component::new(PluginId::from(name), "content", Configuration::default());
            c.weight = weight;
            section.components.push(c);
        }
        section.renumber();
        let order: Vec<_> = section.components.iter().map(|c| c.plugin.0.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        let weights: Vec<_> = section.components.iter().map(|c| c.weight).collect();
        assert_eq!(weights, vec![0, 1, 2]);
    }

    #[test]
    fn push_revision_only_for_revisionable() {
        let mut target = Target::new(TargetId(1), "page", "Home");
        assert_eq!(target.push_revision("sync"), None);
        target.revisionable = true;
        assert_eq!(target.push_revision("first"), Some(1));
        assert_eq!(target.push_revision("second"), Some(2));
        assert_eq!(target.revisions[1].message, "second");
    }

    #[test]
    fn layout_roundtrips_through_yaml() {
        let layout = Layout::Overridden(vec![Section::new(0)]);
        let yaml = serde_yaml::to_string(&layout).expect("serialize");
        let back: Layout = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(back, layout);

        let absent: Layout = serde_yaml::from_str("mode: absent\n").expect("absent");
        assert_eq!(absent, Layout::Absent);
    }
}
