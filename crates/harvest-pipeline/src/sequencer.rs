//! Runs the tiers in order and aggregates their output.
//!
//! Tier 1 mines the dataset; tier 2 sees exactly tier 1's zero-test commits;
//! tier 3 generates for whatever is still uncovered, with the fallback
//! generator re-run once over commits the primary left at zero tests.
//! Each tier persists its artifacts before the next one starts, so a later
//! tier can be re-run alone from disk.

use anyhow::{Context, Result};
use harvest_core::obs::{emit_run_finished, emit_run_started, emit_tier_skipped, run_span};
use harvest_core::reporting::{
    load_commit_list, write_json_artifact, write_tier1_artifacts, write_tier2_artifacts,
    COMMITS_WITHOUT_TESTS_FILE, TIER1_DIR, TIER2_DIR,
};
use harvest_core::{
    read_dataset, Commit, Dataset, ExtractedTest, HarvestError, HarvestResult,
    HistoricalTestLocator, RepositoryCache, Tier, TreeSearchFallback, VersionControl,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::build::ProjectBuilder;
use crate::config::PipelineConfig;
use crate::generator::TestGenerator;
use crate::orchestrator::{
    GenerationOrchestrator, EVOSUITE_RESULTS_FILE, RANDOOP_RESULTS_FILE, TIER3A_DIR, TIER3B_DIR,
};
use crate::summary::{FinalSummary, ALL_TESTS_FILE, FINAL_SUMMARY_FILE};

/// Which tiers a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TierSelection {
    #[default]
    All,
    Historical,
    TreeSearch,
    Generation,
}

impl TierSelection {
    /// Map the `--tier` flag; `None` runs everything.
    pub fn from_flag(tier: Option<u8>) -> HarvestResult<Self> {
        match tier {
            None => Ok(Self::All),
            Some(1) => Ok(Self::Historical),
            Some(2) => Ok(Self::TreeSearch),
            Some(3) => Ok(Self::Generation),
            Some(other) => Err(HarvestError::Config(format!("unknown tier {other}"))),
        }
    }

    /// Whether `tier` runs under this selection.
    pub fn includes(&self, tier: Tier) -> bool {
        match self {
            Self::All => true,
            Self::Historical => tier == Tier::Historical,
            Self::TreeSearch => tier == Tier::TreeSearch,
            Self::Generation => matches!(tier, Tier::PrimaryGeneration | Tier::FallbackGeneration),
        }
    }
}

/// Build and generator implementations used by tier 3.
#[derive(Clone)]
pub struct GenerationBackends {
    pub builder: Arc<dyn ProjectBuilder>,
    pub primary: Arc<dyn TestGenerator>,
    pub fallback: Arc<dyn TestGenerator>,
}

/// Owns one pipeline run: its config, repository cache and backends.
pub struct PipelineSequencer {
    config: PipelineConfig,
    cache: RepositoryCache,
    backends: GenerationBackends,
}

impl PipelineSequencer {
    pub fn new(config: PipelineConfig, vcs: Arc<dyn VersionControl>, backends: GenerationBackends) -> Self {
        let cache = RepositoryCache::new(config.repo.clone(), vcs);
        Self {
            config,
            cache,
            backends,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the selected tiers over the dataset at `dataset_path`.
    ///
    /// An unreadable dataset is the only fatal input error and is reported
    /// before any tier starts.
    pub async fn run(&mut self, dataset_path: &Path, selection: TierSelection) -> Result<FinalSummary> {
        let dataset = read_dataset(dataset_path, self.config.limit)
            .with_context(|| format!("cannot load dataset {}", dataset_path.display()))?;

        let run_id = Uuid::new_v4().to_string();
        let span = run_span(&run_id);
        emit_run_started(&run_id, &dataset_path.display().to_string(), dataset.commits.len());
        info!(
            output_dir = %self.config.output_dir.display(),
            limit = ?self.config.limit,
            selection = ?selection,
            "pipeline starting"
        );

        let started = Instant::now();
        let summary = self
            .run_tiers(&run_id, &dataset, selection)
            .instrument(span)
            .await?;
        emit_run_finished(&run_id, started.elapsed().as_millis() as u64, summary.total_tests);
        Ok(summary)
    }

    async fn run_tiers(&mut self, run_id: &str, dataset: &Dataset, selection: TierSelection) -> Result<FinalSummary> {
        let mut summary = FinalSummary::new(run_id);
        let mut all_tests: Vec<ExtractedTest> = Vec::new();
        let mut tier1_pending: Option<Vec<Commit>> = None;
        let mut tier2_pending: Option<Vec<Commit>> = None;

        if selection.includes(Tier::Historical) {
            let report = HistoricalTestLocator::new(&mut self.cache)
                .process_dataset(dataset)
                .await;
            write_tier1_artifacts(&self.config.tier_dir(TIER1_DIR), &report)?;
            summary.record(
                Tier::Historical,
                &report.stats,
                report.results.len(),
                report.stats.test_methods_extracted,
            )?;
            all_tests.extend(report.tests);
            tier1_pending = Some(report.commits_without_tests);
        }

        if selection.includes(Tier::TreeSearch) {
            let input = match &tier1_pending {
                Some(commits) => Some(commits.clone()),
                None => self.load_tier1_pending()?,
            };
            match input {
                Some(commits) => {
                    let report = TreeSearchFallback::new(&mut self.cache)
                        .check_commits(&commits)
                        .await;
                    write_tier2_artifacts(&self.config.tier_dir(TIER2_DIR), &report)?;
                    summary.record(
                        Tier::TreeSearch,
                        &report.stats,
                        report.tests.len(),
                        report.stats.methods_recovered,
                    )?;
                    all_tests.extend(report.tests);
                    tier2_pending = Some(report.still_without_tests);
                }
                None => {
                    warn!("tier 1 output not found, skipping tier 2");
                    emit_tier_skipped(Tier::TreeSearch, "tier 1 output missing");
                }
            }
        }

        if selection.includes(Tier::PrimaryGeneration) {
            let input = match selection {
                TierSelection::Generation => dataset.commits.clone(),
                _ => tier2_pending.or(tier1_pending).unwrap_or_default(),
            };
            all_tests.extend(self.run_generation(&input, &mut summary).await?);
        }

        write_json_artifact(&self.config.output_dir.join(ALL_TESTS_FILE), &all_tests)?;
        write_json_artifact(&self.config.output_dir.join(FINAL_SUMMARY_FILE), &summary)?;
        summary.log();
        Ok(summary)
    }

    /// Tier 1's persisted zero-test list, if a previous run left one.
    fn load_tier1_pending(&self) -> Result<Option<Vec<Commit>>> {
        let path = self
            .config
            .tier_dir(TIER1_DIR)
            .join(COMMITS_WITHOUT_TESTS_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let commits = load_commit_list(&path)?;
        info!(commits = commits.len(), path = %path.display(), "using persisted tier 1 output");
        Ok(Some(commits))
    }

    async fn run_generation(&mut self, input: &[Commit], summary: &mut FinalSummary) -> Result<Vec<ExtractedTest>> {
        if input.is_empty() {
            info!("no commits left without tests, skipping generation");
            emit_tier_skipped(Tier::PrimaryGeneration, "no commits without tests");
            return Ok(Vec::new());
        }

        let primary_dir = self.config.tier_dir(TIER3A_DIR);
        let primary = GenerationOrchestrator::new(
            &mut self.cache,
            self.backends.builder.clone(),
            self.backends.primary.clone(),
            primary_dir.clone(),
            Tier::PrimaryGeneration,
        )
        .process_commits(input)
        .await;
        primary.write_artifacts(&primary_dir, EVOSUITE_RESULTS_FILE)?;
        summary.record(
            Tier::PrimaryGeneration,
            &primary.stats,
            primary.results.len(),
            primary.stats.tests_generated,
        )?;

        let mut tests = primary.tests.clone();
        let pending = primary.commits_without_tests(input);
        if pending.is_empty() {
            emit_tier_skipped(Tier::FallbackGeneration, "primary generator covered every commit");
            return Ok(tests);
        }

        info!(commits = pending.len(), "primary generator produced nothing, trying fallback");
        let fallback_dir = self.config.tier_dir(TIER3B_DIR);
        let fallback = GenerationOrchestrator::new(
            &mut self.cache,
            self.backends.builder.clone(),
            self.backends.fallback.clone(),
            fallback_dir.clone(),
            Tier::FallbackGeneration,
        )
        .process_commits(&pending)
        .await;
        fallback.write_artifacts(&fallback_dir, RANDOOP_RESULTS_FILE)?;
        summary.record(
            Tier::FallbackGeneration,
            &fallback.stats,
            fallback.results.len(),
            fallback.stats.tests_generated,
        )?;
        tests.extend(fallback.tests);
        Ok(tests)
    }
}
