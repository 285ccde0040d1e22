//! Per-kind capabilities and the registry that resolves them.
//!
//! A [`ComponentTypeMapper`] turns a remote element's configuration into a
//! local configuration fragment. A [`ReplacementProvider`] offers a successor
//! for a deprecated kind. Both are looked up once by discriminator string in
//! a [`MapperRegistry`].

use std::collections::{BTreeMap, HashMap};

use crate::config::{Config, KindConfig, ReplacementConfig};
use crate::error::StoreError;
use crate::types::{Component, Configuration, PluginId, Settings, SYNC_KEY};

pub trait ComponentTypeMapper: Send + Sync {
    /// Local component kind this mapper produces.
    fn plugin_id(&self) -> &PluginId;

    /// Remote element `type` this mapper handles.
    fn source_element_key(&self) -> &str;

    fn map_config(&self, remote: &Settings) -> Settings;
}

/// A successor component offered in place of a deprecated one.
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub plugin: PluginId,
    pub configuration: Configuration,
}

pub trait ReplacementProvider: Send + Sync {
    fn deprecated_plugin(&self) -> &PluginId;

    /// `None` leaves the component untouched.
    fn replacement(&self, component: &Component) -> Option<Replacement>;
}

#[derive(Default)]
pub struct MapperRegistry {
    mappers: Vec<Box<dyn ComponentTypeMapper>>,
    by_source: HashMap<String, usize>,
    by_plugin: HashMap<PluginId, usize>,
    replacements: HashMap<PluginId, Box<dyn ReplacementProvider>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build declarative mappers and providers from `config.yaml`.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let mut registry = Self::new();
        for kind in &config.kinds {
            reject_reserved(&kind.plugin, &kind.fields)?;
            registry.register(Box::new(FieldMapper::from(kind)))?;
        }
        for rule in &config.replacements {
            reject_reserved(&rule.deprecated, &rule.fields)?;
            registry.register_replacement(Box::new(RenameReplacement::from(rule)))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, mapper: Box<dyn ComponentTypeMapper>) -> Result<(), StoreError> {
        let source = mapper.source_element_key().to_string();
        let plugin = mapper.plugin_id().clone();
        if self.by_source.contains_key(&source) {
            return Err(StoreError::DuplicateKind(source));
        }
        if self.by_plugin.contains_key(&plugin) {
            return Err(StoreError::DuplicateKind(plugin.0));
        }
        let index = self.mappers.len();
        self.mappers.push(mapper);
        self.by_source.insert(source, index);
        self.by_plugin.insert(plugin, index);
        Ok(())
    }

    pub fn register_replacement(
        &mut self,
        provider: Box<dyn ReplacementProvider>,
    ) -> Result<(), StoreError> {
        let plugin = provider.deprecated_plugin().clone();
        if self.replacements.contains_key(&plugin) {
            return Err(StoreError::DuplicateKind(plugin.0));
        }
        self.replacements.insert(plugin, provider);
        Ok(())
    }

    /// Mapper handling remote elements of `element_type`.
    pub fn for_source(&self, element_type: &str) -> Option<&dyn ComponentTypeMapper> {
        self.by_source
            .get(element_type)
            .map(|&index| self.mappers[index].as_ref())
    }

    pub fn for_plugin(&self, plugin: &PluginId) -> Option<&dyn ComponentTypeMapper> {
        self.by_plugin
            .get(plugin)
            .map(|&index| self.mappers[index].as_ref())
    }

    /// Registered plugin ids in registration order.
    pub fn plugins(&self) -> impl Iterator<Item = &PluginId> + '_ {
        self.mappers.iter().map(|m| m.plugin_id())
    }

    pub fn replacement_for(&self, plugin: &PluginId) -> Option<&dyn ReplacementProvider> {
        self.replacements.get(plugin).map(|p| p.as_ref())
    }

    pub fn deprecated_plugins(&self) -> Vec<&PluginId> {
        let mut plugins: Vec<_> = self.replacements.keys().collect();
        plugins.sort();
        plugins
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty() && self.replacements.is_empty()
    }
}

fn reject_reserved(owner: &PluginId, fields: &BTreeMap<String, String>) -> Result<(), StoreError> {
    if fields.values().any(|local| local == SYNC_KEY) {
        return Err(StoreError::ReservedKey {
            owner: owner.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Declarative implementations
// ---------------------------------------------------------------------------

/// Mapper driven by a key-rename table.
#[derive(Debug, Clone)]
pub struct FieldMapper {
    plugin: PluginId,
    source_type: String,
    fields: BTreeMap<String, String>,
    pass_through: bool,
}

impl FieldMapper {
    pub fn new(plugin: impl Into<PluginId>, source_type: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            source_type: source_type.into(),
            fields: BTreeMap::new(),
            pass_through: true,
        }
    }

    pub fn with_field(mut self, remote: impl Into<String>, local: impl Into<String>) -> Self {
        self.fields.insert(remote.into(), local.into());
        self
    }

    pub fn pass_through(mut self, enabled: bool) -> Self {
        self.pass_through = enabled;
        self
    }
}

impl From<&KindConfig> for FieldMapper {
    fn from(kind: &KindConfig) -> Self {
        Self {
            plugin: kind.plugin.clone(),
            source_type: kind.source_type.clone(),
            fields: kind.fields.clone(),
            pass_through: kind.pass_through,
        }
    }
}

impl ComponentTypeMapper for FieldMapper {
    fn plugin_id(&self) -> &PluginId {
        &self.plugin
    }

    fn source_element_key(&self) -> &str {
        &self.source_type
    }

    fn map_config(&self, remote: &Settings) -> Settings {
        let mut mapped = Settings::new();
        for (key, value) in remote {
            let local = match self.fields.get(key) {
                Some(local) => local,
                None if self.pass_through => key,
                None => continue,
            };
            // The correlation key is owned by the reconciler.
            if local != SYNC_KEY {
                mapped.insert(local.clone(), value.clone());
            }
        }
        mapped
    }
}

/// Replacement that renames configuration keys onto a successor kind.
#[derive(Debug, Clone)]
pub struct RenameReplacement {
    deprecated: PluginId,
    successor: PluginId,
    fields: BTreeMap<String, String>,
    requires: Vec<String>,
}

impl RenameReplacement {
    pub fn new(deprecated: impl Into<PluginId>, successor: impl Into<PluginId>) -> Self {
        Self {
            deprecated: deprecated.into(),
            successor: successor.into(),
            fields: BTreeMap::new(),
            requires: Vec::new(),
        }
    }

    pub fn with_field(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.fields.insert(old.into(), new.into());
        self
    }

    pub fn requiring(mut self, key: impl Into<String>) -> Self {
        self.requires.push(key.into());
        self
    }
}

impl From<&ReplacementConfig> for RenameReplacement {
    fn from(rule: &ReplacementConfig) -> Self {
        Self {
            deprecated: rule.deprecated.clone(),
            successor: rule.successor.clone(),
            fields: rule.fields.clone(),
            requires: rule.requires.clone(),
        }
    }
}

impl ReplacementProvider for RenameReplacement {
    fn deprecated_plugin(&self) -> &PluginId {
        &self.deprecated
    }

    fn replacement(&self, component: &Component) -> Option<Replacement> {
        let settings = &component.configuration.settings;
        if !self.requires.iter().all(|key| settings.contains_key(key)) {
            return None;
        }
        let mut renamed = Settings::new();
        for (key, value) in settings {
            let key = self.fields.get(key).unwrap_or(key);
            if key != SYNC_KEY {
                renamed.insert(key.clone(), value.clone());
            }
        }
        Some(Replacement {
            plugin: self.successor.clone(),
            configuration: Configuration {
                sync: component.configuration.sync.clone(),
                settings: renamed,
            },
        })
    }
}
