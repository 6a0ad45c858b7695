//! Tier 2: widen the search to every test file in the mirrored test packages.

use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::domain::{Commit, ExtractedTest, Tier, Tier2Stats};
use crate::extract::harvest_file;
use crate::obs::{emit_tier_finished, emit_tier_started, CommitSpan};
use crate::paths::{is_test_file, test_dir_prefix};
use crate::repo_cache::{RepoMode, RepositoryCache};

/// Everything tier 2 produced.
#[derive(Debug, Clone, Default)]
pub struct Tier2Report {
    pub stats: Tier2Stats,
    pub tests: Vec<ExtractedTest>,
    /// Input commits that are still without tests, in input order.
    pub still_without_tests: Vec<Commit>,
}

/// Lists the test directories mirroring each changed source's package and
/// extracts every test file found there.
pub struct TreeSearchFallback<'a> {
    cache: &'a mut RepositoryCache,
    stats: Tier2Stats,
}

impl<'a> TreeSearchFallback<'a> {
    pub fn new(cache: &'a mut RepositoryCache) -> Self {
        Self {
            cache,
            stats: Tier2Stats::default(),
        }
    }

    pub fn stats(&self) -> &Tier2Stats {
        &self.stats
    }

    /// Tests recovered for one commit.
    pub async fn check_commit(&mut self, commit: &Commit) -> Vec<ExtractedTest> {
        self.stats.checked += 1;

        let prefixes: BTreeSet<String> = commit
            .java_files()
            .filter(|f| !is_test_file(f))
            .filter_map(test_dir_prefix)
            .collect();
        if prefixes.is_empty() {
            return Vec::new();
        }

        let repo = match self.cache.acquire(&commit.project, RepoMode::Bare).await {
            Ok(repo) => repo,
            Err(e) => {
                debug!(error = %e, "no repository for commit");
                return Vec::new();
            }
        };

        let key = commit.key();
        let vcs = self.cache.vcs();
        let mut scanned: HashSet<String> = HashSet::new();
        let mut tests = Vec::new();

        for prefix in &prefixes {
            let listed = match vcs.list_tree(&repo, &commit.commit_sha, prefix).await {
                Ok(listed) => listed,
                Err(e) => {
                    debug!(prefix = %prefix, error = %e, "tree listing failed");
                    continue;
                }
            };
            for path in listed {
                if !is_test_file(&path) || !scanned.insert(path.clone()) {
                    continue;
                }
                self.stats.files_scanned += 1;
                let content = match vcs.show_file(&repo, &commit.commit_sha, &path).await {
                    Ok(Some(content)) if !content.is_empty() => content,
                    _ => continue,
                };
                tests.extend(harvest_file(&key, &path, &content, Tier::TreeSearch));
            }
        }

        if !tests.is_empty() {
            self.stats.recovered += 1;
            self.stats.methods_recovered += tests.len() as u64;
        }
        tests
    }

    /// Run tier 2 over the commits tier 1 left without tests.
    pub async fn check_commits(mut self, commits: &[Commit]) -> Tier2Report {
        emit_tier_started(Tier::TreeSearch, commits.len());

        let mut report = Tier2Report::default();
        for commit in commits {
            let tests = CommitSpan::new(Tier::TreeSearch, commit)
                .instrument(self.check_commit(commit))
                .await;
            if tests.is_empty() {
                report.still_without_tests.push(commit.clone());
            }
            report.tests.extend(tests);
        }

        self.stats.flush();
        emit_tier_finished(Tier::TreeSearch, self.stats.methods_recovered);
        report.stats = self.stats;
        report
    }
}
