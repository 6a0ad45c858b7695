//! Tier 3: check out, build and generate tests for one commit at a time.
//!
//! Each commit walks a fixed sequence of stages (checkout, module detection,
//! build, class selection, generation) and ends in exactly one
//! [`GenerationResult`]. A failed stage stops the commit, never the run.

use anyhow::Result;
use harvest_core::obs::{emit_tier_finished, emit_tier_started, CommitSpan};
use harvest_core::reporting::{write_json_artifact, StatsAndResults};
use harvest_core::{
    harvest_file, paths, Commit, ExtractedTest, FailureReason, GenerationResult, GenerationStats,
    RepositoryCache, Tier,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::build::{find_classes_dirs, ProjectBuilder};
use crate::classes::{collect_compiled_classes, target_classes};
use crate::generator::{GenerationRequest, TestGenerator};

pub const TIER3A_DIR: &str = "tier3_evosuite";
pub const TIER3B_DIR: &str = "tier3b_randoop";
pub const EVOSUITE_RESULTS_FILE: &str = "evosuite_results.json";
pub const RANDOOP_RESULTS_FILE: &str = "randoop_results.json";

/// Everything one generation tier produced.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub tier: Tier,
    pub tool: String,
    pub stats: GenerationStats,
    /// One result per input commit, in input order.
    pub results: Vec<GenerationResult>,
    /// Generated tests run back through the extractor.
    pub tests: Vec<ExtractedTest>,
}

impl GenerationReport {
    /// Input commits for which nothing was generated.
    pub fn commits_without_tests(&self, inputs: &[Commit]) -> Vec<Commit> {
        inputs
            .iter()
            .zip(&self.results)
            .filter(|(_, r)| r.tests_generated == 0)
            .map(|(c, _)| c.clone())
            .collect()
    }

    /// Write `{stats, results}` to `dir/file_name`.
    pub fn write_artifacts(&self, dir: &Path, file_name: &str) -> Result<()> {
        write_json_artifact(
            &dir.join(file_name),
            &StatsAndResults {
                stats: &self.stats,
                results: self.results.iter().collect(),
            },
        )
    }
}

/// Drives one generator over a list of commits.
pub struct GenerationOrchestrator<'a> {
    cache: &'a mut RepositoryCache,
    builder: Arc<dyn ProjectBuilder>,
    generator: Arc<dyn TestGenerator>,
    output_dir: PathBuf,
    tier: Tier,
    stats: GenerationStats,
}

impl<'a> GenerationOrchestrator<'a> {
    pub fn new(
        cache: &'a mut RepositoryCache,
        builder: Arc<dyn ProjectBuilder>,
        generator: Arc<dyn TestGenerator>,
        output_dir: impl Into<PathBuf>,
        tier: Tier,
    ) -> Self {
        Self {
            cache,
            builder,
            generator,
            output_dir: output_dir.into(),
            tier,
            stats: GenerationStats::default(),
        }
    }

    pub fn stats(&self) -> &GenerationStats {
        &self.stats
    }

    /// Per-commit generated-sources directory.
    pub fn commit_output_dir(&self, commit: &Commit) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}_tests", commit.project, commit.short_sha()))
    }

    fn fail(&mut self, commit: &Commit, reason: FailureReason) -> (GenerationResult, Vec<ExtractedTest>) {
        self.stats.failures += 1;
        (GenerationResult::failed(commit, self.generator.tool(), reason), Vec::new())
    }

    /// Run the stage sequence for one commit.
    pub async fn generate_for_commit(&mut self, commit: &Commit) -> (GenerationResult, Vec<ExtractedTest>) {
        let tool = self.generator.tool();

        let checkout = match self.cache.checkout(&commit.project, &commit.commit_sha).await {
            Ok(checkout) => checkout,
            Err(e) => {
                error!(error = %e, "checkout failed");
                return self.fail(commit, FailureReason::Checkout);
            }
        };
        self.stats.commits_cloned += 1;

        let module = paths::target_module(commit.files.iter().map(|f| f.file_name.as_str()));
        let build = match self.builder.build(&checkout.path, module.as_deref()).await {
            Ok(build) => build,
            Err(e) => {
                error!(error = %e, "build failed");
                return self.fail(commit, FailureReason::Compile);
            }
        };
        self.stats.commits_compiled += 1;

        let mut classes = target_classes(commit);
        if classes.is_empty() {
            classes = collect_compiled_classes(&find_classes_dirs(&checkout.path));
        } else {
            debug!(classes = %classes.join(", "), "targeting changed classes");
        }
        if classes.is_empty() {
            error!("no compiled classes to target");
            return self.fail(commit, FailureReason::NoClasses);
        }

        let out_dir = self.commit_output_dir(commit);
        if let Err(e) = reset_dir(&out_dir).await {
            error!(dir = %out_dir.display(), error = %e, "cannot prepare output directory");
            return self.fail(commit, FailureReason::ToolMissing);
        }

        let outcome = self
            .generator
            .generate(&GenerationRequest {
                classpath: &build.classpath,
                classes: &classes,
                out_dir: &out_dir,
            })
            .await;

        if outcome.crashed {
            self.stats.tool_crashes += 1;
        }
        self.stats.tool_timeouts += outcome.timeouts;
        let generated = outcome.tests_generated();
        self.stats.tests_generated += generated;

        let key = commit.key();
        let mut tests = Vec::new();
        for file in &outcome.test_files {
            let content = match tokio::fs::read_to_string(file).await {
                Ok(content) => content,
                Err(e) => {
                    debug!(file = %file.display(), error = %e, "unreadable generated file");
                    continue;
                }
            };
            let rel = relative_path(&out_dir, file);
            tests.extend(harvest_file(&key, &rel, &content, self.tier));
        }

        let reason = if outcome.tool_missing {
            Some(FailureReason::ToolMissing)
        } else if outcome.crashed {
            Some(FailureReason::ToolCrash)
        } else {
            None
        };
        let result = GenerationResult::finished(commit, tool, generated, outcome.classes_attempted, reason);
        if result.is_success() {
            info!(tests = generated, methods = tests.len(), "generated tests");
        } else {
            warn!(classes = outcome.classes_attempted, "no tests generated");
        }
        (result, tests)
    }

    /// Run the generator over every commit, in order.
    pub async fn process_commits(mut self, commits: &[Commit]) -> GenerationReport {
        let tool = self.generator.tool();
        emit_tier_started(self.tier, commits.len());

        let mut results = Vec::with_capacity(commits.len());
        let mut tests = Vec::new();
        for (idx, commit) in commits.iter().enumerate() {
            self.stats.commits_attempted += 1;
            info!(
                progress = %format!("{}/{}", idx + 1, commits.len()),
                commit = %commit.key(),
                tool = tool,
                "generating"
            );
            let (result, generated) = CommitSpan::new(self.tier, commit)
                .instrument(self.generate_for_commit(commit))
                .await;
            results.push(result);
            tests.extend(generated);
        }

        self.stats.flush(tool);
        emit_tier_finished(self.tier, self.stats.tests_generated);
        GenerationReport {
            tier: self.tier,
            tool: tool.to_string(),
            stats: self.stats,
            results,
            tests,
        }
    }
}

async fn reset_dir(dir: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(dir).await? {
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await
}

fn relative_path(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = Path::new("/out/p_abc_tests");
        assert_eq!(
            relative_path(root, &root.join("org").join("p").join("Foo_ESTest.java")),
            "org/p/Foo_ESTest.java"
        );
    }

    #[test]
    fn test_commits_without_tests_follow_input_order() {
        let commits = vec![Commit::new("p", "a1"), Commit::new("p", "b2"), Commit::new("p", "c3")];
        let report = GenerationReport {
            tier: Tier::PrimaryGeneration,
            tool: "evosuite".into(),
            stats: GenerationStats::default(),
            results: vec![
                GenerationResult::failed(&commits[0], "evosuite", FailureReason::Compile),
                GenerationResult::finished(&commits[1], "evosuite", 3, 1, None),
                GenerationResult::finished(&commits[2], "evosuite", 0, 4, None),
            ],
            tests: Vec::new(),
        };
        let pending: Vec<_> = report
            .commits_without_tests(&commits)
            .into_iter()
            .map(|c| c.commit_sha)
            .collect();
        assert_eq!(pending, vec!["a1", "c3"]);
    }
}
