//! Structured observability hooks for pipeline runs.
//!
//! This module provides:
//! - Commit-scoped tracing spans via [`CommitSpan`]
//! - Emission functions for run and tier lifecycle events
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG`.

use std::future::Future;
use tracing::instrument::Instrumented;
use tracing::{info, Instrument};

use crate::domain::{Commit, Tier};

/// Span tagging everything logged while one commit is processed.
///
/// The span is attached to the commit's future rather than entered, so it
/// stays correct across `.await` points.
///
/// # Example
///
/// ```ignore
/// let tests = CommitSpan::new(Tier::Historical, &commit)
///     .instrument(locator.process_commit(&commit))
///     .await;
/// ```
pub struct CommitSpan {
    span: tracing::Span,
}

impl CommitSpan {
    pub fn new(tier: Tier, commit: &Commit) -> Self {
        let span = tracing::info_span!(
            "harvest.commit",
            tier = %tier,
            project = %commit.project,
            sha = %commit.short_sha(),
        );
        Self { span }
    }

    pub fn instrument<F: Future>(self, fut: F) -> Instrumented<F> {
        fut.instrument(self.span)
    }
}

/// Span for a whole pipeline run.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("harvest.run", run_id = %run_id)
}

/// Emit event: pipeline run started.
pub fn emit_run_started(run_id: &str, dataset: &str, commits: usize) {
    info!(event = "run.started", run_id = %run_id, dataset = %dataset, commits = commits);
}

/// Emit event: pipeline run finished.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, total_tests: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        total_tests = total_tests,
    );
}

/// Emit event: a tier is starting over `commits` inputs.
pub fn emit_tier_started(tier: Tier, commits: usize) {
    info!(event = "tier.started", tier = %tier, commits = commits);
}

/// Emit event: a tier finished having produced `tests` tests.
pub fn emit_tier_finished(tier: Tier, tests: u64) {
    info!(event = "tier.finished", tier = %tier, tests = tests);
}

/// Emit event: a tier was skipped.
pub fn emit_tier_skipped(tier: Tier, reason: &str) {
    info!(event = "tier.skipped", tier = %tier, reason = %reason);
}
