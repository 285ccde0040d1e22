//! One unit of work against one target, and the commit protocol around it.
//!
//! ## `run_unit`: 6-step protocol
//!
//! 1. Load the target and its bundle default sections.
//! 2. Fingerprint the effective sections.
//! 3. Apply the unit of work in memory (a target without a layout is a no-op).
//! 4. Fingerprint again → `Updated` / `Unchanged`, optional diff.
//! 5. Skip persistence if the unit asked for none, or in dry-run mode.
//! 6. Optional revision, save, invalidate cached edit sessions. An
//!    invalidation failure after a successful save becomes a report warning.
//!
//! Persistence is always the last step, so a failing unit never leaves a
//! target half-written.

use std::fmt;

use chrono::Utc;

use strata_core::{Section, StoreError, Target, TargetId, TargetRepository};

use crate::diff::diff_sections;
use crate::fingerprint::fingerprint;
use crate::SyncError;

/// What a unit of work did to a target in memory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnitOutcome {
    /// The unit found something to act on (for reconciliation: at least one
    /// remote element was processed).
    pub applied: bool,
    /// The target must be written back.
    pub persist: bool,
    /// Short human-readable account, also used as the revision message.
    pub summary: String,
}

/// A mutation applied to one target per batch tick.
pub trait UnitOfWork {
    /// Short operation name used in logs and revision messages.
    fn label(&self) -> &str;

    /// Mutate `target` in memory. `default` holds the bundle's default
    /// sections for copy-on-write.
    fn apply(&self, target: &mut Target, default: &[Section]) -> Result<UnitOutcome, SyncError>;
}

impl<T: UnitOfWork + ?Sized> UnitOfWork for Box<T> {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn apply(&self, target: &mut Target, default: &[Section]) -> Result<UnitOutcome, SyncError> {
        (**self).apply(target, default)
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunFlags {
    pub create_revisions: bool,
    pub dry_run: bool,
    /// Attach a unified diff to reports of changed targets.
    pub capture_diff: bool,
}

/// Outcome of running a unit of work against one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    /// Written back and the effective layout changed.
    Updated,
    /// Nothing changed in the effective layout (it may still have been saved).
    Unchanged,
    /// `dry_run` mode: the target *would* have been written.
    WouldUpdate,
    /// The target carries no component layout.
    NotApplicable,
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetStatus::Updated => write!(f, "updated"),
            TargetStatus::Unchanged => write!(f, "unchanged"),
            TargetStatus::WouldUpdate => write!(f, "would update"),
            TargetStatus::NotApplicable => write!(f, "not applicable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: TargetId,
    pub status: TargetStatus,
    pub applied: bool,
    pub summary: String,
    pub revision: Option<u64>,
    pub diff: Option<String>,
    /// Problems that did not stop the target from being written.
    pub warnings: Vec<String>,
}

impl TargetReport {
    fn not_applicable(target: TargetId) -> Self {
        Self {
            target,
            status: TargetStatus::NotApplicable,
            applied: false,
            summary: "no component layout".to_string(),
            revision: None,
            diff: None,
            warnings: Vec::new(),
        }
    }
}

/// Load, apply, and commit one target.
pub fn run_unit(
    repo: &mut dyn TargetRepository,
    unit: &dyn UnitOfWork,
    id: TargetId,
    flags: RunFlags,
) -> Result<TargetReport, SyncError> {
    // Step 1: load.
    let mut target = repo.load(id)?;
    let default = repo.default_layout(&target.bundle)?;

    // Step 2: fingerprint the effective layout.
    let before = target.layout.resolve(&default).to_vec();
    let before_digest = fingerprint(&before)?;

    // Step 3: apply in memory.
    let outcome = match unit.apply(&mut target, &default) {
        Ok(outcome) => outcome,
        Err(SyncError::Store(StoreError::NotApplicable { .. })) => {
            tracing::debug!("target {id}: no component layout, skipping {}", unit.label());
            return Ok(TargetReport::not_applicable(id));
        }
        Err(err) => return Err(err),
    };

    // Step 4: compare.
    let after = target.layout.resolve(&default);
    let changed = fingerprint(after)? != before_digest;
    let diff = if flags.capture_diff && changed {
        diff_sections(id, &before, after)?
    } else {
        None
    };

    let mut report = TargetReport {
        target: id,
        status: TargetStatus::Unchanged,
        applied: outcome.applied,
        summary: outcome.summary.clone(),
        revision: None,
        diff,
        warnings: Vec::new(),
    };

    // Step 5: persistence gates.
    if !outcome.persist {
        tracing::debug!("target {id}: {} left nothing to write", unit.label());
        return Ok(report);
    }
    if flags.dry_run {
        if changed {
            tracing::info!("[dry-run] target {id}: would {} ({})", unit.label(), outcome.summary);
            report.status = TargetStatus::WouldUpdate;
        }
        return Ok(report);
    }

    // Step 6: commit.
    target.updated_at = Utc::now();
    if flags.create_revisions {
        report.revision =
            target.push_revision(format!("{}: {}", unit.label(), outcome.summary));
    }
    repo.save(&target)
        .map_err(|source| SyncError::PersistenceFailure { target: id, source })?;
    if let Err(err) = repo.invalidate_edit_session(id) {
        tracing::warn!("target {id}: saved, but the edit session was not cleared: {err}");
        report
            .warnings
            .push(format!("saved, but the edit session was not cleared: {err}"));
    }

    tracing::info!("target {id}: {} ({})", unit.label(), outcome.summary);
    if changed {
        report.status = TargetStatus::Updated;
    }
    Ok(report)
}
