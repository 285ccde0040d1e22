//! Error types for strata-sync.

use std::path::PathBuf;

use thiserror::Error;

use strata_core::{StoreError, TargetId};

/// Why remote elements could not be fetched for a target.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No remote source configured, or the target carries no source key.
    #[error("remote source not configured")]
    NotConfigured,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("empty response body")]
    EmptyBody,

    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload itself signals an authorization failure.
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// All errors that can arise from reconciliation and batch mutation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote source could not deliver elements; the target was not touched.
    #[error("source unavailable for target {target}: {source}")]
    SourceUnavailable {
        target: TargetId,
        #[source]
        source: FetchError,
    },

    /// No mapper is registered for a remote element type.
    #[error("no mapper for remote element type '{0}'")]
    UnknownElementKind(String),

    /// The target could not be written back.
    #[error("failed to persist target {target}: {source}")]
    PersistenceFailure {
        target: TargetId,
        #[source]
        source: StoreError,
    },

    /// Any other storage error (load, query, invalidation).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A field-update rule name that is not in the configuration.
    #[error("no field update rule named '{0}'")]
    UnknownRule(String),

    /// YAML rendering for dry-run diffs and fingerprints.
    #[error("layout serialization error: {0}")]
    Render(#[from] serde_yaml::Error),
}
