//! Error types for strata-core.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::types::{PluginId, TargetId};

/// All errors that can arise from layout storage, configuration and registry operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.strata/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The configuration file did not exist at the expected path.
    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("target {id} not found")]
    TargetNotFound { id: TargetId },

    /// The target's bundle carries no component collection.
    #[error("target {id} has no component layout")]
    NotApplicable { id: TargetId },

    #[error("target {id} has no section with delta {delta}")]
    SectionNotFound { id: TargetId, delta: u32 },

    /// Appending would push a weight past `i64::MAX`.
    #[error("target {id}: section {delta} has no weight left to append")]
    WeightOverflow { id: TargetId, delta: u32 },

    /// A field map or rule writes onto the reserved `sync` key.
    #[error("{owner}: `sync` is reserved for the correlation key")]
    ReservedKey { owner: String },

    #[error("component {uuid} not found in section {delta}")]
    ComponentNotFound { delta: u32, uuid: Uuid },

    /// Two mappers claimed the same plugin id or remote element type.
    #[error("duplicate registration for {0}")]
    DuplicateKind(String),

    #[error("no mapper registered for plugin {0}")]
    UnknownPlugin(PluginId),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
