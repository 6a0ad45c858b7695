//! Persisted tier artifacts (pretty JSON, written once per tier run).

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{Commit, ExtractedTest};
use crate::locator::Tier1Report;
use crate::tree_search::Tier2Report;

pub const TIER1_DIR: &str = "tier1_extracted";
pub const TIER2_DIR: &str = "tier2_doublecheck";

pub const EXTRACTION_RESULTS_FILE: &str = "extraction_results.json";
pub const COMMITS_WITHOUT_TESTS_FILE: &str = "commits_without_tests.json";
pub const EXTRACTED_TESTS_FILE: &str = "extracted_tests.json";
pub const DOUBLECHECK_RESULTS_FILE: &str = "doublecheck_results.json";

/// `{stats, results}` artifact shape shared by tier 1 and tier 3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsAndResults<S, R> {
    pub stats: S,
    pub results: Vec<R>,
}

/// `{stats, tests}` artifact shape of tier 2.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsAndTests<S> {
    pub stats: S,
    pub tests: Vec<ExtractedTest>,
}

/// Write `value` as pretty JSON, creating parent directories.
pub fn write_json_artifact<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Read a JSON artifact written by [`write_json_artifact`].
pub fn read_json_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Commit list with `before` payloads stripped.
fn commit_list(commits: &[Commit]) -> Vec<Commit> {
    commits.iter().map(Commit::without_content).collect()
}

/// Write the three tier-1 artifacts into `dir`.
pub fn write_tier1_artifacts(dir: &Path, report: &Tier1Report) -> Result<()> {
    write_json_artifact(
        &dir.join(EXTRACTION_RESULTS_FILE),
        &StatsAndResults {
            stats: &report.stats,
            results: report.results.iter().collect(),
        },
    )?;
    write_json_artifact(
        &dir.join(COMMITS_WITHOUT_TESTS_FILE),
        &commit_list(&report.commits_without_tests),
    )?;
    write_json_artifact(&dir.join(EXTRACTED_TESTS_FILE), &report.tests)?;
    Ok(())
}

/// Write the tier-2 artifacts into `dir`.
pub fn write_tier2_artifacts(dir: &Path, report: &Tier2Report) -> Result<()> {
    write_json_artifact(
        &dir.join(DOUBLECHECK_RESULTS_FILE),
        &StatsAndTests {
            stats: &report.stats,
            tests: report.tests.clone(),
        },
    )?;
    write_json_artifact(
        &dir.join(COMMITS_WITHOUT_TESTS_FILE),
        &commit_list(&report.still_without_tests),
    )?;
    Ok(())
}

/// Load a persisted commit list (`commits_without_tests.json`).
pub fn load_commit_list(path: &Path) -> Result<Vec<Commit>> {
    read_json_artifact(path)
}
