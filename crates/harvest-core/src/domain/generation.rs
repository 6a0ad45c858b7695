//! Tier-3 generation outcomes.

use serde::{Deserialize, Serialize};

use super::commit::Commit;

/// Terminal state of the build-and-generate state machine for one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Success,
    NoTests,
    Failed,
}

/// Why a commit ended without generated tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[serde(rename = "clone/checkout")]
    Checkout,
    Compile,
    NoClasses,
    ToolCrash,
    ToolMissing,
}

/// Per-commit record persisted in the tier-3 results artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub project: String,
    pub commit_sha: String,
    pub tool: String,
    pub tests_generated: u64,
    pub status: GenerationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    #[serde(default)]
    pub classes_attempted: usize,
}

impl GenerationResult {
    pub fn failed(commit: &Commit, tool: &str, reason: FailureReason) -> Self {
        Self {
            project: commit.project.clone(),
            commit_sha: commit.commit_sha.clone(),
            tool: tool.to_string(),
            tests_generated: 0,
            status: GenerationStatus::Failed,
            reason: Some(reason),
            classes_attempted: 0,
        }
    }

    /// `Success` when anything was generated, `NoTests` otherwise.
    pub fn finished(
        commit: &Commit,
        tool: &str,
        tests_generated: u64,
        classes_attempted: usize,
        reason: Option<FailureReason>,
    ) -> Self {
        let status = if tests_generated > 0 {
            GenerationStatus::Success
        } else {
            GenerationStatus::NoTests
        };
        Self {
            project: commit.project.clone(),
            commit_sha: commit.commit_sha.clone(),
            tool: tool.to_string(),
            tests_generated,
            status,
            reason: if tests_generated > 0 { None } else { reason },
            classes_attempted,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == GenerationStatus::Success
    }
}
