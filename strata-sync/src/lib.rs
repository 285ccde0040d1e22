//! # strata-sync
//!
//! Reconciliation against a remote element source, layout mutators, and the
//! tick-driven batch runner that applies them target by target.
//!
//! Call [`pipeline::run`] to run an [`Operation`] over a set of targets, or
//! drive a [`BatchRunner`] tick by tick.

pub mod batch;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod mutators;
pub mod pipeline;
pub mod reconciler;
pub mod unit;

pub use batch::{BatchContext, BatchReport, BatchRequest, BatchRunner, Limit, Progress};
pub use error::{FetchError, SyncError};
pub use fetch::{RemoteElement, RemoteElementFetcher};
pub use pipeline::{Operation, SourceOverride};
pub use reconciler::{ReconcileOptions, ReconcileOutcome, ReconcileWork, Reconciler};
pub use unit::{run_unit, RunFlags, TargetReport, TargetStatus, UnitOfWork, UnitOutcome};
