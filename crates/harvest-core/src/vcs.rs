//! Version-control collaborator.
//!
//! [`VersionControl`] is the seam between the tiers and `git`. [`GitCli`]
//! drives the `git` binary through a [`CommandRunner`]; tests use
//! [`crate::fakes::MemoryVcs`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{HarvestError, HarvestResult};
use crate::process::{excerpt, CommandOutput, CommandRunner, CommandSpec};
use crate::repo_cache::{RepoMode, RepositoryHandle};

/// Per-operation git timeouts in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitTimeouts {
    pub clone_secs: u64,
    pub show_secs: u64,
    pub ls_tree_secs: u64,
    pub clean_secs: u64,
    pub checkout_secs: u64,
    pub rev_parse_secs: u64,
}

impl Default for GitTimeouts {
    fn default() -> Self {
        Self {
            clone_secs: 600,
            show_secs: 30,
            ls_tree_secs: 60,
            clean_secs: 60,
            checkout_secs: 30,
            rev_parse_secs: 5,
        }
    }
}

/// Operations the pipeline needs from a version-control system.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone `url` into `dest` (bare or with a working tree).
    async fn clone_repository(&self, url: &str, dest: &Path, mode: RepoMode) -> HarvestResult<()>;

    /// Content of `path` at `revision`, `None` when it does not exist there.
    async fn show_file(
        &self,
        repo: &RepositoryHandle,
        revision: &str,
        path: &str,
    ) -> HarvestResult<Option<String>>;

    /// Every file path under `prefix` at `revision`.
    async fn list_tree(
        &self,
        repo: &RepositoryHandle,
        revision: &str,
        prefix: &str,
    ) -> HarvestResult<Vec<String>>;

    /// Remove untracked and ignored files from a working tree.
    async fn reset_worktree(&self, worktree: &Path) -> HarvestResult<()>;

    /// Force-checkout `revision` in a working tree.
    async fn checkout(&self, worktree: &Path, revision: &str) -> HarvestResult<()>;

    /// Full sha of `HEAD` in a working tree.
    async fn resolve_head(&self, worktree: &Path) -> HarvestResult<String>;
}

/// [`VersionControl`] backed by the `git` command line.
pub struct GitCli {
    runner: Arc<dyn CommandRunner>,
    timeouts: GitTimeouts,
}

impl GitCli {
    pub fn new(runner: Arc<dyn CommandRunner>, timeouts: GitTimeouts) -> Self {
        Self { runner, timeouts }
    }

    /// Base `git` invocation with repository-selecting variables cleared and
    /// credential prompts disabled.
    fn git(&self, timeout_secs: u64) -> CommandSpec {
        CommandSpec::new("git")
            .without_env("GIT_DIR")
            .without_env("GIT_WORK_TREE")
            .with_env("GIT_TERMINAL_PROMPT", "0")
            .with_timeout(timeout_secs)
    }

    fn in_repo(&self, repo: &RepositoryHandle, timeout_secs: u64) -> CommandSpec {
        match repo.mode {
            RepoMode::Bare => self
                .git(timeout_secs)
                .arg("--git-dir")
                .arg(repo.path.display().to_string()),
            RepoMode::WorkingTree => self.git(timeout_secs).in_dir(&repo.path),
        }
    }

    async fn run_checked(&self, spec: CommandSpec, command: &str) -> HarvestResult<CommandOutput> {
        let out = self.runner.run(&spec).await?;
        if !out.success() {
            return Err(HarvestError::Git {
                command: command.to_string(),
                reason: format!("exit {}: {}", out.exit_code, excerpt(out.stderr.trim(), 300)),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn clone_repository(&self, url: &str, dest: &Path, mode: RepoMode) -> HarvestResult<()> {
        let flag = match mode {
            RepoMode::Bare => "--bare",
            RepoMode::WorkingTree => "--no-single-branch",
        };
        let spec = self
            .git(self.timeouts.clone_secs)
            .with_args(["clone", flag, url])
            .arg(dest.display().to_string());
        let out = self.runner.run(&spec).await?;
        if !out.success() {
            return Err(HarvestError::Network {
                url: url.to_string(),
                reason: excerpt(out.stderr.trim(), 300).to_string(),
            });
        }
        Ok(())
    }

    async fn show_file(
        &self,
        repo: &RepositoryHandle,
        revision: &str,
        path: &str,
    ) -> HarvestResult<Option<String>> {
        let spec = self
            .in_repo(repo, self.timeouts.show_secs)
            .arg("show")
            .arg(format!("{revision}:{path}"));
        let out = self.runner.run(&spec).await?;
        if !out.success() {
            debug!(path = %path, revision = %revision, "not present at revision");
            return Ok(None);
        }
        Ok(Some(out.stdout))
    }

    async fn list_tree(
        &self,
        repo: &RepositoryHandle,
        revision: &str,
        prefix: &str,
    ) -> HarvestResult<Vec<String>> {
        let mut spec = self
            .in_repo(repo, self.timeouts.ls_tree_secs)
            .with_args(["ls-tree", "-r", "--name-only", revision]);
        if !prefix.is_empty() {
            spec = spec.arg("--").arg(prefix);
        }
        let out = self.runner.run(&spec).await?;
        if !out.success() {
            debug!(prefix = %prefix, revision = %revision, "ls-tree failed");
            return Ok(Vec::new());
        }
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn reset_worktree(&self, worktree: &Path) -> HarvestResult<()> {
        let spec = self
            .git(self.timeouts.clean_secs)
            .in_dir(worktree)
            .with_args(["clean", "-fdx", "-e", ".git"]);
        self.run_checked(spec, "clean").await.map(|_| ())
    }

    async fn checkout(&self, worktree: &Path, revision: &str) -> HarvestResult<()> {
        let spec = self
            .git(self.timeouts.checkout_secs)
            .in_dir(worktree)
            .with_args(["checkout", "-f", revision]);
        self.run_checked(spec, "checkout").await.map(|_| ())
    }

    async fn resolve_head(&self, worktree: &Path) -> HarvestResult<String> {
        let spec = self
            .git(self.timeouts.rev_parse_secs)
            .in_dir(worktree)
            .with_args(["rev-parse", "HEAD"]);
        let out = self.run_checked(spec, "rev-parse").await?;
        let sha = out.stdout.trim().to_string();
        if sha.is_empty() {
            return Err(HarvestError::Git {
                command: "rev-parse".to_string(),
                reason: "empty output".to_string(),
            });
        }
        Ok(sha)
    }
}

/// Whether a resolved `HEAD` matches the requested revision, comparing
/// case-insensitively over the shorter of the two.
pub fn revision_matches(resolved: &str, requested: &str) -> bool {
    let n = resolved.len().min(requested.len());
    if n == 0 {
        return false;
    }
    match (resolved.get(..n), requested.get(..n)) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}
