//! Per-run repository cache.
//!
//! One local copy per (project, mode), cloned on first use and reused for
//! every later commit of that project. Clone failures are remembered for the
//! lifetime of the cache and never retried.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{HarvestError, HarvestResult};
use crate::vcs::{GitTimeouts, VersionControl};

/// How a project copy is held locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoMode {
    /// `git clone --bare`, used for history lookups.
    Bare,
    /// Full clone with a working tree, used for builds.
    WorkingTree,
}

/// Local repository path bound to a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    pub project: String,
    pub path: PathBuf,
    pub mode: RepoMode,
}

/// Where repositories come from and where they live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub repos_dir: PathBuf,
    /// Remote URL with a `{project}` placeholder.
    pub remote_url_template: String,
    pub git: GitTimeouts,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            repos_dir: PathBuf::from("repos"),
            remote_url_template: "https://github.com/apache/{project}.git".to_string(),
            git: GitTimeouts::default(),
        }
    }
}

impl RepoConfig {
    pub fn remote_url(&self, project: &str) -> String {
        self.remote_url_template.replace("{project}", project)
    }

    pub fn bare_path(&self, project: &str) -> PathBuf {
        self.repos_dir.join(format!("{project}.git"))
    }

    pub fn worktree_path(&self, project: &str) -> PathBuf {
        self.repos_dir.join("worktrees").join(project)
    }

    pub fn path_for(&self, project: &str, mode: RepoMode) -> PathBuf {
        match mode {
            RepoMode::Bare => self.bare_path(project),
            RepoMode::WorkingTree => self.worktree_path(project),
        }
    }
}

/// Explicit per-run cache of local repository copies.
pub struct RepositoryCache {
    pub(crate) config: RepoConfig,
    pub(crate) vcs: Arc<dyn VersionControl>,
    handles: HashMap<(String, RepoMode), RepositoryHandle>,
    failures: HashSet<(String, RepoMode)>,
}

impl RepositoryCache {
    pub fn new(config: RepoConfig, vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            config,
            vcs,
            handles: HashMap::new(),
            failures: HashSet::new(),
        }
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn vcs(&self) -> &dyn VersionControl {
        self.vcs.as_ref()
    }

    /// Whether an earlier clone of (project, mode) failed during this run.
    pub fn is_unavailable(&self, project: &str, mode: RepoMode) -> bool {
        self.failures.contains(&(project.to_string(), mode))
    }

    /// Local copy of `project`, cloning it on first use.
    ///
    /// A copy already on disk is reused as-is. After a failed clone every
    /// later call returns [`HarvestError::CloneUnavailable`] without touching
    /// the network.
    pub async fn acquire(&mut self, project: &str, mode: RepoMode) -> HarvestResult<RepositoryHandle> {
        let key = (project.to_string(), mode);
        if self.failures.contains(&key) {
            return Err(HarvestError::CloneUnavailable {
                project: project.to_string(),
            });
        }
        if let Some(handle) = self.handles.get(&key) {
            return Ok(handle.clone());
        }

        let path = self.config.path_for(project, mode);
        if !path.exists() {
            self.clone_into(project, mode, &path).await?;
        }

        let handle = RepositoryHandle {
            project: project.to_string(),
            path,
            mode,
        };
        self.handles.insert(key, handle.clone());
        Ok(handle)
    }

    /// Clone into `path`, recording a permanent failure on error.
    pub(crate) async fn clone_into(&mut self, project: &str, mode: RepoMode, path: &Path) -> HarvestResult<()> {
        let url = self.config.remote_url(project);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(project = %project, url = %url, mode = ?mode, "cloning");
        match self.vcs.clone_repository(&url, path, mode).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(project = %project, error = %e, "clone failed, project marked unavailable");
                if path.exists() {
                    let _ = std::fs::remove_dir_all(path);
                }
                self.failures.insert((project.to_string(), mode));
                self.handles.remove(&(project.to_string(), mode));
                Err(e)
            }
        }
    }

    pub(crate) fn forget(&mut self, project: &str, mode: RepoMode) {
        self.handles.remove(&(project.to_string(), mode));
    }

    pub(crate) fn remember(&mut self, handle: RepositoryHandle) {
        self.handles
            .insert((handle.project.clone(), handle.mode), handle);
    }
}
