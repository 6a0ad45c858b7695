//! Cross-tier aggregation written at the end of a run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use harvest_core::Tier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

pub const FINAL_SUMMARY_FILE: &str = "final_summary.json";
pub const ALL_TESTS_FILE: &str = "all_tests.json";

/// One tier's entry in [`FinalSummary::tier_summaries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSummary {
    /// The tier's stats struct, as persisted in its own artifact.
    pub stats: serde_json::Value,
    pub results_count: usize,
    /// Tests this tier contributed to the total.
    pub tests: u64,
}

/// `final_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub total_tests: u64,
    /// Keyed by tier label (`tier1`, `tier2`, `tier3a`, `tier3b`); tiers
    /// that did not run are absent.
    pub tier_summaries: BTreeMap<String, TierSummary>,
}

impl FinalSummary {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            generated_at: Utc::now(),
            total_tests: 0,
            tier_summaries: BTreeMap::new(),
        }
    }

    /// Record a finished tier and add its tests to the total.
    pub fn record<S: Serialize>(&mut self, tier: Tier, stats: &S, results_count: usize, tests: u64) -> Result<()> {
        let stats = serde_json::to_value(stats)
            .with_context(|| format!("failed to serialize {tier} stats"))?;
        if let Some(previous) = self.tier_summaries.insert(
            tier.label().to_string(),
            TierSummary {
                stats,
                results_count,
                tests,
            },
        ) {
            self.total_tests -= previous.tests;
        }
        self.total_tests += tests;
        Ok(())
    }

    pub fn tests_for(&self, tier: Tier) -> Option<u64> {
        self.tier_summaries.get(tier.label()).map(|s| s.tests)
    }

    /// Log the per-tier breakdown at INFO.
    pub fn log(&self) {
        for (name, tier) in &self.tier_summaries {
            info!(tier = %name, tests = tier.tests, results = tier.results_count, "tier total");
        }
        info!(run_id = %self.run_id, total_tests = self.total_tests, "pipeline complete");
    }
}
