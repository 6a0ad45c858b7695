//! Error taxonomy for testharvest.

use std::path::PathBuf;

/// Errors produced while acquiring repositories, building projects and
/// harvesting tests.
///
/// Only [`HarvestError::Dataset`] is fatal to a pipeline run; every other
/// variant is recorded against the commit being processed.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("network failure fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("repository for {project} is unavailable (earlier clone failed)")]
    CloneUnavailable { project: String },

    #[error("checkout of {project} at {revision} failed: {reason}")]
    Checkout {
        project: String,
        revision: String,
        reason: String,
    },

    #[error("git {command} failed: {reason}")]
    Git { command: String, reason: String },

    #[error("build failed: {0}")]
    Build(String),

    #[error("{program} timed out after {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("skipped dataset line {line}: {reason}")]
    ParseSkip { line: usize, reason: String },

    #[error("cannot read dataset {}: {source}", path.display())]
    Dataset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Whether this error is the step-level timeout of a child process.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarvestError::Timeout { .. })
    }
}

/// Result type for testharvest operations.
pub type HarvestResult<T> = std::result::Result<T, HarvestError>;
