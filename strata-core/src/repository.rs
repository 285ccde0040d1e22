//! Persistence port for targets, with an in-memory and a YAML-file backend.
//!
//! # Storage layout ([`FileRepository`])
//!
//! ```text
//! ~/.strata/
//!   defaults/<bundle>.yaml       (read-only default sections per bundle)
//!   targets/<id>.yaml            (one file per target, mode 0600)
//!   edit_sessions/<id>.yaml      (cached interactive edit copies)
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::config;
use crate::error::{io_err, StoreError};
use crate::types::{Section, Target, TargetId};
use tracing::warn;

/// Which targets a batch considers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetFilter {
    #[default]
    All,
    Bundles(Vec<String>),
    Ids(Vec<TargetId>),
}

impl TargetFilter {
    pub fn matches(&self, target: &Target) -> bool {
        match self {
            TargetFilter::All => true,
            TargetFilter::Bundles(bundles) => bundles.iter().any(|b| *b == target.bundle),
            TargetFilter::Ids(ids) => ids.contains(&target.id),
        }
    }
}

/// Read/write access to targets and their bundle defaults.
pub trait TargetRepository {
    /// Ids of targets matching `filter`, ascending.
    fn candidate_ids(&self, filter: &TargetFilter) -> Result<Vec<TargetId>, StoreError>;

    fn load(&self, id: TargetId) -> Result<Target, StoreError>;

    fn save(&mut self, target: &Target) -> Result<(), StoreError>;

    /// Drop any cached interactive edit copy of the target's layout.
    fn invalidate_edit_session(&mut self, id: TargetId) -> Result<(), StoreError>;

    /// Default sections for `bundle`; empty when the bundle has none.
    fn default_layout(&self, bundle: &str) -> Result<Vec<Section>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    targets: BTreeMap<TargetId, Target>,
    defaults: HashMap<String, Vec<Section>>,
    edit_sessions: BTreeSet<TargetId>,
    saves: usize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: Target) {
        self.targets.insert(target.id, target);
    }

    pub fn get(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(&id)
    }

    pub fn set_default_layout(&mut self, bundle: impl Into<String>, sections: Vec<Section>) {
        self.defaults.insert(bundle.into(), sections);
    }

    pub fn open_edit_session(&mut self, id: TargetId) {
        self.edit_sessions.insert(id);
    }

    pub fn has_edit_session(&self, id: TargetId) -> bool {
        self.edit_sessions.contains(&id)
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl TargetRepository for MemoryRepository {
    fn candidate_ids(&self, filter: &TargetFilter) -> Result<Vec<TargetId>, StoreError> {
        Ok(self
            .targets
            .values()
            .filter(|t| filter.matches(t))
            .map(|t| t.id)
            .collect())
    }

    fn load(&self, id: TargetId) -> Result<Target, StoreError> {
        self.targets
            .get(&id)
            .cloned()
            .ok_or(StoreError::TargetNotFound { id })
    }

    fn save(&mut self, target: &Target) -> Result<(), StoreError> {
        self.targets.insert(target.id, target.clone());
        self.saves += 1;
        Ok(())
    }

    fn invalidate_edit_session(&mut self, id: TargetId) -> Result<(), StoreError> {
        self.edit_sessions.remove(&id);
        Ok(())
    }

    fn default_layout(&self, bundle: &str) -> Result<Vec<Section>, StoreError> {
        Ok(self.defaults.get(bundle).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// YAML files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    /// Repository rooted at `<home>/.strata/`.
    pub fn at(home: &Path) -> Self {
        Self {
            root: config::strata_dir_at(home),
        }
    }

    /// `at` convenience wrapper using `dirs::home_dir()`.
    pub fn open() -> Result<Self, StoreError> {
        Ok(Self::at(&config::home()?))
    }

    /// `<root>/targets/<id>.yaml`: pure, no I/O.
    pub fn target_path(&self, id: TargetId) -> PathBuf {
        self.root.join("targets").join(format!("{id}.yaml"))
    }

    pub fn default_path(&self, bundle: &str) -> PathBuf {
        self.root.join("defaults").join(format!("{bundle}.yaml"))
    }

    pub fn edit_session_path(&self, id: TargetId) -> PathBuf {
        self.root.join("edit_sessions").join(format!("{id}.yaml"))
    }

    /// Write the default sections for a bundle.
    pub fn save_default_layout(&self, bundle: &str, sections: &[Section]) -> Result<(), StoreError> {
        let yaml = serde_yaml::to_string(sections)?;
        write_atomic(&self.default_path(bundle), &yaml)
    }

    /// Cache an interactive edit copy of the target's current layout.
    pub fn save_edit_session(&self, target: &Target) -> Result<(), StoreError> {
        let yaml = serde_yaml::to_string(&target.layout)?;
        write_atomic(&self.edit_session_path(target.id), &yaml)
    }

    pub fn has_edit_session(&self, id: TargetId) -> bool {
        self.edit_session_path(id).exists()
    }

    fn target_ids(&self) -> Result<Vec<TargetId>, StoreError> {
        let dir = self.root.join("targets");
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut ids: Vec<TargetId> = std::fs::read_dir(&dir)
            .map_err(|e| io_err(&dir, e))?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".yaml")?.parse::<u64>().ok()
            })
            .map(TargetId)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl TargetRepository for FileRepository {
    fn candidate_ids(&self, filter: &TargetFilter) -> Result<Vec<TargetId>, StoreError> {
        let ids = self.target_ids()?;
        match filter {
            TargetFilter::All => Ok(ids),
            TargetFilter::Ids(wanted) => Ok(ids.into_iter().filter(|id| wanted.contains(id)).collect()),
            TargetFilter::Bundles(_) => {
                let mut matching = Vec::new();
                for id in ids {
                    // Unreadable targets stay candidates so the batch reports them per target.
                    match self.load(id) {
                        Ok(target) if filter.matches(&target) => matching.push(id),
                        Ok(_) => {}
                        Err(err) => {
                            warn!("target {id}: cannot check bundle: {err}");
                            matching.push(id);
                        }
                    }
                }
                Ok(matching)
            }
        }
    }

    fn load(&self, id: TargetId) -> Result<Target, StoreError> {
        let path = self.target_path(id);
        if !path.exists() {
            return Err(StoreError::TargetNotFound { id });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })
    }

    fn save(&mut self, target: &Target) -> Result<(), StoreError> {
        let yaml = serde_yaml::to_string(target)?;
        write_atomic(&self.target_path(target.id), &yaml)
    }

    fn invalidate_edit_session(&mut self, id: TargetId) -> Result<(), StoreError> {
        let path = self.edit_session_path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    fn default_layout(&self, bundle: &str) -> Result<Vec<Section>, StoreError> {
        let path = self.default_path(bundle);
        if !path.exists() {
            return Ok(vec![]);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })
    }
}

/// Write flow: `.tmp` sibling → `chmod 0600` → `rename`.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}
