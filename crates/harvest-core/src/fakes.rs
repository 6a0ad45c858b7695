//! In-memory fakes for the process and version-control seams (testing only).
//!
//! `MemoryVcs` serves file content per revision and simulates clones by
//! creating the destination directory. `ScriptedRunner` answers every
//! command through a closure and records what was asked.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::domain::{HarvestError, HarvestResult};
use crate::process::{CommandOutput, CommandRunner, CommandSpec};
use crate::repo_cache::{RepoMode, RepositoryHandle};
use crate::vcs::VersionControl;

// ---------------------------------------------------------------------------
// MemoryVcs
// ---------------------------------------------------------------------------

/// In-memory [`VersionControl`]: revision -> path -> content.
#[derive(Debug, Default)]
pub struct MemoryVcs {
    trees: Mutex<HashMap<String, BTreeMap<String, String>>>,
    failing_clones: Mutex<HashSet<String>>,
    heads: Mutex<HashMap<PathBuf, String>>,
    pinned_heads: Mutex<HashMap<PathBuf, String>>,
    clones: AtomicU64,
    resets: AtomicU64,
    shows: AtomicU64,
}

impl MemoryVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `revision` known without any files.
    pub fn add_revision(&self, revision: &str) {
        self.trees
            .lock()
            .unwrap()
            .entry(revision.to_string())
            .or_default();
    }

    pub fn add_file(&self, revision: &str, path: &str, content: &str) {
        self.trees
            .lock()
            .unwrap()
            .entry(revision.to_string())
            .or_default()
            .insert(path.to_string(), content.to_string());
    }

    /// Every clone of `url` fails with a network error.
    pub fn fail_clone(&self, url: &str) {
        self.failing_clones.lock().unwrap().insert(url.to_string());
    }

    /// `rev-parse HEAD` in `worktree` reports `sha` until the next clone there.
    pub fn pin_head(&self, worktree: &Path, sha: &str) {
        self.pinned_heads
            .lock()
            .unwrap()
            .insert(worktree.to_path_buf(), sha.to_string());
    }

    pub fn clone_count(&self) -> u64 {
        self.clones.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> u64 {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn show_count(&self) -> u64 {
        self.shows.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionControl for MemoryVcs {
    async fn clone_repository(&self, url: &str, dest: &Path, _mode: RepoMode) -> HarvestResult<()> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        if self.failing_clones.lock().unwrap().contains(url) {
            return Err(HarvestError::Network {
                url: url.to_string(),
                reason: "repository not found".to_string(),
            });
        }
        std::fs::create_dir_all(dest)?;
        self.pinned_heads.lock().unwrap().remove(dest);
        Ok(())
    }

    async fn show_file(
        &self,
        _repo: &RepositoryHandle,
        revision: &str,
        path: &str,
    ) -> HarvestResult<Option<String>> {
        self.shows.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .trees
            .lock()
            .unwrap()
            .get(revision)
            .and_then(|tree| tree.get(path))
            .cloned())
    }

    async fn list_tree(
        &self,
        _repo: &RepositoryHandle,
        revision: &str,
        prefix: &str,
    ) -> HarvestResult<Vec<String>> {
        Ok(self
            .trees
            .lock()
            .unwrap()
            .get(revision)
            .map(|tree| {
                tree.keys()
                    .filter(|p| p.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn reset_worktree(&self, _worktree: &Path) -> HarvestResult<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn checkout(&self, worktree: &Path, revision: &str) -> HarvestResult<()> {
        if !self.trees.lock().unwrap().contains_key(revision) {
            return Err(HarvestError::Git {
                command: "checkout".to_string(),
                reason: format!("unknown revision {revision}"),
            });
        }
        self.heads
            .lock()
            .unwrap()
            .insert(worktree.to_path_buf(), revision.to_string());
        Ok(())
    }

    async fn resolve_head(&self, worktree: &Path) -> HarvestResult<String> {
        if let Some(sha) = self.pinned_heads.lock().unwrap().get(worktree) {
            return Ok(sha.clone());
        }
        self.heads
            .lock()
            .unwrap()
            .get(worktree)
            .cloned()
            .ok_or_else(|| HarvestError::Git {
                command: "rev-parse".to_string(),
                reason: "no HEAD".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&CommandSpec) -> HarvestResult<CommandOutput> + Send + Sync>;

/// [`CommandRunner`] that answers through a closure and records every call.
pub struct ScriptedRunner {
    handler: Handler,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> HarvestResult<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command exits 0 with empty output.
    pub fn succeeding() -> Self {
        Self::new(|_| Ok(CommandOutput::ok("")))
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, pred: impl Fn(&CommandSpec) -> bool) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| pred(c))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> HarvestResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        (self.handler)(spec)
    }
}
