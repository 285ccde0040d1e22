//! Tick-driven batch execution of a unit of work across many targets.
//!
//! A [`BatchRunner`] seeds its [`BatchContext`] from the repository on the
//! first tick, then processes exactly one target per tick. Every per-target
//! error is caught at the tick boundary: it is counted as skipped and recorded
//! with the target id, and the batch moves on.

use std::collections::VecDeque;

use strata_core::{TargetFilter, TargetId, TargetRepository};

use crate::unit::{run_unit, RunFlags, TargetReport, UnitOfWork};
use crate::SyncError;

/// Which restriction of the candidate set applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    #[default]
    None,
    Bundle,
    Id,
}

/// Administrative trigger for a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchRequest {
    pub limit: Limit,
    pub bundles: Vec<String>,
    pub ids: Vec<TargetId>,
    pub create_revisions: bool,
    pub dry_run: bool,
    /// Capture a unified diff for every changed target.
    pub capture_diff: bool,
}

impl BatchRequest {
    pub fn filter(&self) -> TargetFilter {
        match self.limit {
            Limit::None => TargetFilter::All,
            Limit::Bundle => TargetFilter::Bundles(self.bundles.clone()),
            Limit::Id => TargetFilter::Ids(self.ids.clone()),
        }
    }

    pub fn flags(&self) -> RunFlags {
        RunFlags {
            create_revisions: self.create_revisions,
            dry_run: self.dry_run,
            capture_diff: self.capture_diff,
        }
    }
}

/// Mutable run state, owned by the runner between ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchContext {
    pub queue: VecDeque<TargetId>,
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl BatchContext {
    pub fn seed(ids: Vec<TargetId>) -> Self {
        Self {
            total: ids.len(),
            queue: ids.into(),
            ..Self::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Fraction of targets handled so far; an empty batch is complete.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.total - self.remaining()) as f64 / self.total as f64
    }
}

/// Snapshot published after each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub target: TargetId,
    pub done: usize,
    pub total: usize,
    pub fraction: f64,
    /// `None` when the target was skipped.
    pub report: Option<TargetReport>,
    pub error: Option<String>,
}

/// Aggregate result of a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub reports: Vec<TargetReport>,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!(
            "processed {}, skipped {} of {}",
            self.processed, self.skipped, self.total
        )
    }

    /// Some targets failed or were written with warnings; the batch itself
    /// still finished.
    pub fn completed_with_warnings(&self) -> bool {
        !self.errors.is_empty() || self.reports.iter().any(|r| !r.warnings.is_empty())
    }
}

pub struct BatchRunner<'r> {
    repo: &'r mut dyn TargetRepository,
    unit: Box<dyn UnitOfWork + 'r>,
    request: BatchRequest,
    context: Option<BatchContext>,
    reports: Vec<TargetReport>,
}

impl<'r> BatchRunner<'r> {
    pub fn new(
        repo: &'r mut dyn TargetRepository,
        unit: Box<dyn UnitOfWork + 'r>,
        request: BatchRequest,
    ) -> Self {
        Self {
            repo,
            unit,
            request,
            context: None,
            reports: Vec::new(),
        }
    }

    /// The run state, once seeded.
    pub fn context(&self) -> Option<&BatchContext> {
        self.context.as_ref()
    }

    fn seed(&mut self) -> Result<(), SyncError> {
        if self.context.is_none() {
            let ids = self.repo.candidate_ids(&self.request.filter())?;
            tracing::info!("{}: {} candidate target(s)", self.unit.label(), ids.len());
            self.context = Some(BatchContext::seed(ids));
        }
        Ok(())
    }

    /// Process one target. Returns `Ok(None)` once the queue is drained.
    ///
    /// Only a failure of the candidate query is returned as an error; all
    /// per-target failures are recorded in the context.
    pub fn tick(&mut self) -> Result<Option<Progress>, SyncError> {
        self.seed()?;
        let flags = self.request.flags();
        let Some(context) = self.context.as_mut() else {
            return Ok(None);
        };
        let Some(id) = context.queue.pop_front() else {
            return Ok(None);
        };

        let (report, error) = match run_unit(&mut *self.repo, self.unit.as_ref(), id, flags) {
            Ok(report) => {
                context.processed += 1;
                self.reports.push(report.clone());
                (Some(report), None)
            }
            Err(err) => {
                let message = format!("target {id}: {err}");
                tracing::warn!("{}: {message}", self.unit.label());
                context.skipped += 1;
                context.errors.push(message.clone());
                (None, Some(message))
            }
        };

        Ok(Some(Progress {
            target: id,
            done: context.total - context.remaining(),
            total: context.total,
            fraction: context.progress(),
            report,
            error,
        }))
    }

    /// Aggregate counts; ticks that never ran count as neither processed nor skipped.
    pub fn finish(self) -> BatchReport {
        let context = self.context.unwrap_or_default();
        BatchReport {
            total: context.total,
            processed: context.processed,
            skipped: context.skipped,
            errors: context.errors,
            reports: self.reports,
        }
    }

    /// Tick until drained, calling `on_progress` after every tick.
    pub fn run(mut self, mut on_progress: impl FnMut(&Progress)) -> Result<BatchReport, SyncError> {
        while let Some(progress) = self.tick()? {
            on_progress(&progress);
        }
        let report = self.finish();
        if report.completed_with_warnings() {
            tracing::warn!("batch completed with warnings: {}", report.summary());
        } else {
            tracing::info!("batch completed: {}", report.summary());
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Layout, MemoryRepository, Section, Target};

    use crate::unit::UnitOutcome;

    /// Fails on one chosen target, succeeds without changes elsewhere.
    struct FailOn(TargetId);

    impl UnitOfWork for FailOn {
        fn label(&self) -> &str {
            "fail-on"
        }

        fn apply(&self, target: &mut Target, _default: &[Section]) -> Result<UnitOutcome, SyncError> {
            if target.id == self.0 {
                return Err(SyncError::UnknownRule("boom".into()));
            }
            Ok(UnitOutcome::default())
        }
    }

    fn repo(ids: &[u64]) -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        for id in ids {
            let mut target = Target::new(TargetId(*id), if id % 2 == 0 { "page" } else { "article" }, "t");
            target.layout = Layout::Overridden(vec![]);
            repo.insert(target);
        }
        repo
    }

    #[test]
    fn errors_are_contained_per_target() {
        let mut repo = repo(&[1, 2, 3]);
        let runner = BatchRunner::new(&mut repo, Box::new(FailOn(TargetId(2))), BatchRequest::default());
        let mut fractions = Vec::new();
        let report = runner.run(|p| fractions.push(p.fraction)).expect("run");
        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("target 2:"));
        assert!(report.completed_with_warnings());
        assert_eq!(report.summary(), "processed 2, skipped 1 of 3");
        assert_eq!(fractions.len(), 3);
        assert!((fractions[2] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bundle_limit_restricts_candidates() {
        let mut repo = repo(&[1, 2, 3, 4]);
        let request = BatchRequest {
            limit: Limit::Bundle,
            bundles: vec!["page".into()],
            ..BatchRequest::default()
        };
        let report = BatchRunner::new(&mut repo, Box::new(FailOn(TargetId(99))), request)
            .run(|_| {})
            .expect("run");
        assert_eq!(report.total, 2);
        let ids: Vec<_> = report.reports.iter().map(|r| r.target).collect();
        assert_eq!(ids, vec![TargetId(2), TargetId(4)]);
    }

    #[test]
    fn empty_batch_finishes_immediately() {
        let mut repo = MemoryRepository::new();
        let mut runner = BatchRunner::new(&mut repo, Box::new(FailOn(TargetId(1))), BatchRequest::default());
        assert!(runner.tick().expect("tick").is_none());
        assert_eq!(runner.context().map(BatchContext::progress), Some(1.0));
        let report = runner.finish();
        assert_eq!(report.summary(), "processed 0, skipped 0 of 0");
        assert!(!report.completed_with_warnings());
    }
}
