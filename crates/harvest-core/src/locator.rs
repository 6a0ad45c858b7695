//! Tier 1: locate existing tests for changed files in repository history.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::domain::{Commit, ExtractedTest, HarvestError, Tier, Tier1Stats};
use crate::extract::harvest_file;
use crate::obs::{emit_tier_finished, emit_tier_started, CommitSpan};
use crate::paths::{is_test_file, test_candidates};
use crate::repo_cache::{RepoMode, RepositoryCache};

const PROGRESS_EVERY: usize = 100;

/// Per-commit outcome persisted in `extraction_results.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitExtraction {
    pub project: String,
    pub commit_sha: String,
    pub files_checked: u64,
    pub test_files_found: u64,
    pub test_methods: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub repository_unavailable: bool,
}

impl CommitExtraction {
    fn empty(commit: &Commit) -> Self {
        Self {
            project: commit.project.clone(),
            commit_sha: commit.commit_sha.clone(),
            files_checked: 0,
            test_files_found: 0,
            test_methods: 0,
            repository_unavailable: false,
        }
    }
}

/// Everything tier 1 produced for a dataset.
#[derive(Debug, Clone, Default)]
pub struct Tier1Report {
    pub stats: Tier1Stats,
    pub results: Vec<CommitExtraction>,
    pub tests: Vec<ExtractedTest>,
    /// Commits with zero extracted tests, in dataset order.
    pub commits_without_tests: Vec<Commit>,
}

/// Looks up candidate test files at each commit's revision in a bare clone.
pub struct HistoricalTestLocator<'a> {
    cache: &'a mut RepositoryCache,
    stats: Tier1Stats,
}

impl<'a> HistoricalTestLocator<'a> {
    pub fn new(cache: &'a mut RepositoryCache) -> Self {
        Self {
            cache,
            stats: Tier1Stats::default(),
        }
    }

    pub fn stats(&self) -> &Tier1Stats {
        &self.stats
    }

    /// Candidate lookup and extraction for one commit.
    pub async fn process_commit(&mut self, commit: &Commit) -> (CommitExtraction, Vec<ExtractedTest>) {
        let mut result = CommitExtraction::empty(commit);
        let mut tests = Vec::new();

        let repo = match self.cache.acquire(&commit.project, RepoMode::Bare).await {
            Ok(repo) => repo,
            Err(HarvestError::CloneUnavailable { .. }) => {
                result.repository_unavailable = true;
                return (result, tests);
            }
            Err(e) => {
                debug!(error = %e, "no repository for commit");
                self.stats.clone_failures += 1;
                result.repository_unavailable = true;
                return (result, tests);
            }
        };

        let key = commit.key();
        let vcs = self.cache.vcs();
        let mut tried: HashSet<String> = HashSet::new();

        for file in commit.java_files() {
            result.files_checked += 1;
            let candidates = if is_test_file(file) {
                vec![file.to_string()]
            } else {
                test_candidates(file)
            };

            for candidate in candidates {
                if !tried.insert(candidate.clone()) {
                    continue;
                }
                self.stats.test_candidates_tried += 1;

                let content = match vcs.show_file(&repo, &commit.commit_sha, &candidate).await {
                    Ok(Some(content)) if !content.is_empty() => content,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(path = %candidate, error = %e, "candidate lookup failed");
                        continue;
                    }
                };
                result.test_files_found += 1;
                self.stats.test_files_found += 1;

                let found = harvest_file(&key, &candidate, &content, Tier::Historical);
                result.test_methods += found.len() as u64;
                tests.extend(found);
            }
        }

        self.stats.files_checked += result.files_checked;
        self.stats.test_methods_extracted += result.test_methods;
        (result, tests)
    }

    /// Run tier 1 over every commit of `dataset`.
    pub async fn process_dataset(mut self, dataset: &Dataset) -> Tier1Report {
        emit_tier_started(Tier::Historical, dataset.commits.len());
        self.stats.malformed_lines = dataset.malformed_lines;

        let mut report = Tier1Report::default();
        for (idx, commit) in dataset.commits.iter().enumerate() {
            let (result, tests) = CommitSpan::new(Tier::Historical, commit)
                .instrument(self.process_commit(commit))
                .await;

            self.stats.commits_processed += 1;
            if result.test_methods == 0 {
                self.stats.commits_with_zero_tests += 1;
                report.commits_without_tests.push(commit.clone());
            }
            report.results.push(result);
            report.tests.extend(tests);

            let processed = idx + 1;
            if processed % PROGRESS_EVERY == 0 {
                info!(
                    processed,
                    tests = self.stats.test_methods_extracted,
                    test_files = self.stats.test_files_found,
                    "tier1 progress"
                );
            }
        }

        self.stats.flush();
        emit_tier_finished(Tier::Historical, self.stats.test_methods_extracted);
        report.stats = self.stats;
        report
    }
}
