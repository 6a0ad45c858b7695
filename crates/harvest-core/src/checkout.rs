//! Scoped working checkout shared by both generators.
//!
//! An existing working copy is cleaned, force-checked-out and verified. If
//! that fails, the copy is deleted and one fresh clone + checkout + verify is
//! attempted. A failed fresh attempt never leaves a partial copy behind.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::{HarvestError, HarvestResult};
use crate::repo_cache::{RepoMode, RepositoryCache, RepositoryHandle};
use crate::vcs::revision_matches;

/// A working tree verified to be at the requested revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCheckout {
    pub project: String,
    pub revision: String,
    /// Full sha reported by `rev-parse HEAD`.
    pub resolved: String,
    pub path: PathBuf,
}

/// Removes a directory on drop unless disarmed.
struct DiscardOnDrop<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> DiscardOnDrop<'a> {
    fn arm(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DiscardOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            debug!(path = %self.path.display(), "discarding partial checkout");
            let _ = std::fs::remove_dir_all(self.path);
        }
    }
}

impl RepositoryCache {
    /// Working tree of `project` at `revision`.
    ///
    /// Only clone failures are remembered; a checkout or verification
    /// failure on one commit does not block later commits of the project.
    pub async fn checkout(&mut self, project: &str, revision: &str) -> HarvestResult<WorkingCheckout> {
        let path = self.config.worktree_path(project);
        let failed = |reason: String| HarvestError::Checkout {
            project: project.to_string(),
            revision: revision.to_string(),
            reason,
        };

        if path.exists() {
            match self.refresh(&path, revision).await {
                Ok(resolved) => {
                    debug!(project = %project, revision = %revision, "reused working copy");
                    return Ok(WorkingCheckout {
                        project: project.to_string(),
                        revision: revision.to_string(),
                        resolved,
                        path,
                    });
                }
                Err(e) => {
                    warn!(project = %project, error = %e, "working copy unusable, re-cloning");
                    let _ = std::fs::remove_dir_all(&path);
                    self.forget(project, RepoMode::WorkingTree);
                }
            }
        }

        if self.is_unavailable(project, RepoMode::WorkingTree) {
            let unavailable = HarvestError::CloneUnavailable {
                project: project.to_string(),
            };
            return Err(failed(unavailable.to_string()));
        }

        let guard = DiscardOnDrop::arm(&path);
        self.clone_into(project, RepoMode::WorkingTree, &path)
            .await
            .map_err(|e| failed(e.to_string()))?;
        self.vcs
            .checkout(&path, revision)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let resolved = self
            .vcs
            .resolve_head(&path)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !revision_matches(&resolved, revision) {
            return Err(failed(format!("HEAD resolved to {resolved}")));
        }
        guard.disarm();

        self.remember(RepositoryHandle {
            project: project.to_string(),
            path: path.clone(),
            mode: RepoMode::WorkingTree,
        });
        Ok(WorkingCheckout {
            project: project.to_string(),
            revision: revision.to_string(),
            resolved,
            path,
        })
    }

    async fn refresh(&self, path: &Path, revision: &str) -> HarvestResult<String> {
        self.vcs.reset_worktree(path).await?;
        self.vcs.checkout(path, revision).await?;
        let resolved = self.vcs.resolve_head(path).await?;
        if !revision_matches(&resolved, revision) {
            return Err(HarvestError::Git {
                command: "rev-parse".to_string(),
                reason: format!("HEAD is {resolved}, wanted {revision}"),
            });
        }
        Ok(resolved)
    }
}
