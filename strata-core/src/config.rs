//! `~/.strata/config.yaml`: remote source, component kinds, replacement and
//! field-update rules.
//!
//! Every function that touches the filesystem has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::types::PluginId;

pub const CONFIG_VERSION: u32 = 1;

fn default_region() -> String {
    "content".to_string()
}

fn default_access_key_header() -> String {
    "X-Access-Key".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Where remote elements are fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Elements for a target are read from `<base_url>/<source_key>`.
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default = "default_access_key_header")]
    pub access_key_header: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// A declarative component kind: which remote `type` it handles and how
/// remote configuration keys become local ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindConfig {
    pub plugin: PluginId,
    pub source_type: String,
    /// Remote key → local key.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Copy remote keys that have no entry in `fields` unchanged.
    #[serde(default)]
    pub pass_through: bool,
}

/// Swap a deprecated kind for its successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementConfig {
    pub deprecated: PluginId,
    pub successor: PluginId,
    /// Old key → new key; unlisted keys are carried over as-is.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Only offer a replacement when all of these keys are set.
    #[serde(default)]
    pub requires: Vec<String>,
}

/// Force a nested leaf field to a constant across matching components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdateRule {
    pub name: String,
    pub plugins: Vec<PluginId>,
    /// Keys to descend through; lists met along the way are walked element-wise.
    pub path: Vec<String>,
    pub field: String,
    pub value: serde_json::Value,
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,
    /// Region assigned to components created by reconciliation.
    #[serde(default = "default_region")]
    pub default_region: String,
    #[serde(default)]
    pub kinds: Vec<KindConfig>,
    #[serde(default)]
    pub replacements: Vec<ReplacementConfig>,
    #[serde(default)]
    pub field_updates: Vec<FieldUpdateRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            source: None,
            default_region: default_region(),
            kinds: Vec::new(),
            replacements: Vec::new(),
            field_updates: Vec::new(),
        }
    }
}

impl Config {
    pub fn field_update(&self, name: &str) -> Option<&FieldUpdateRule> {
        self.field_updates.iter().find(|rule| rule.name == name)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.strata/`: pure, no I/O.
pub fn strata_dir_at(home: &Path) -> PathBuf {
    home.join(".strata")
}

/// `<home>/.strata/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    strata_dir_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load `config.yaml`.
///
/// Returns `StoreError::ConfigNotFound` if absent,
/// `StoreError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, StoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(StoreError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, StoreError> {
    load_at(&home()?)
}

/// Atomically save `config.yaml` (`.tmp` sibling + rename).
pub fn save_at(home: &Path, config: &Config) -> Result<(), StoreError> {
    let dir = strata_dir_at(home);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    let path = config_path_at(home);
    let tmp = path.with_file_name("config.yaml.tmp");
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// Write a default `config.yaml` unless one exists.
///
/// Idempotent: an existing file is loaded and returned unchanged. The flag is
/// true when a new file was written.
pub fn init_at(home: &Path) -> Result<(Config, bool), StoreError> {
    if config_path_at(home).exists() {
        return Ok((load_at(home)?, false));
    }
    let config = Config::default();
    save_at(home, &config)?;
    Ok((config, true))
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<(Config, bool), StoreError> {
    init_at(&home()?)
}

pub(crate) fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_config_returns_not_found() {
        let home = TempDir::new().expect("home");
        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, StoreError::ConfigNotFound { .. }));
    }

    #[test]
    fn init_is_idempotent() {
        let home = TempDir::new().expect("home");
        let (_, created) = init_at(home.path()).expect("first init");
        assert!(created);
        let (config, created) = init_at(home.path()).expect("second init");
        assert!(!created);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn parses_kinds_and_rules() {
        let home = TempDir::new().expect("home");
        let dir = strata_dir_at(home.path());
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(
            config_path_at(home.path()),
            r#"
version: 1
source:
  base_url: https://cms.example.org/api/elements
  access_key: s3cret
kinds:
  - plugin: inline_text
    source_type: text
    fields:
      body: text
    pass_through: true
field_updates:
  - name: table-format
    plugins: [table]
    path: [items, columns]
    field: format
    value: plain
"#,
        )
        .expect("write");

        let config = load_at(home.path()).expect("load");
        let source = config.source.as_ref().expect("source");
        assert_eq!(source.access_key_header, "X-Access-Key");
        assert_eq!(source.timeout_secs, 30);
        assert_eq!(config.default_region, "content");
        assert_eq!(config.kinds[0].fields.get("body"), Some(&"text".to_string()));
        let rule = config.field_update("table-format").expect("rule");
        assert_eq!(rule.value, serde_json::json!("plain"));
    }

    #[test]
    fn malformed_config_reports_path() {
        let home = TempDir::new().expect("home");
        std::fs::create_dir_all(strata_dir_at(home.path())).expect("mkdir");
        std::fs::write(config_path_at(home.path()), "kinds: [unclosed").expect("write");
        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }
}
