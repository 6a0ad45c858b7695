//! Dataset commit records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A changed file within a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Repository-relative path.
    #[serde(default)]
    pub file_name: String,

    /// Content before the change, when the dataset carries it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
}

impl ChangedFile {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            before: None,
        }
    }

    pub fn is_java(&self) -> bool {
        self.file_name.ends_with(".java")
    }
}

/// One dataset record: a commit of a project and the files it touched.
///
/// Unknown dataset fields are ignored on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub project: String,
    pub commit_sha: String,
    #[serde(default)]
    pub files: Vec<ChangedFile>,
}

impl Commit {
    pub fn new(project: impl Into<String>, commit_sha: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            commit_sha: commit_sha.into(),
            files: Vec::new(),
        }
    }

    /// Builder-style helper used mostly by tests.
    pub fn with_file(mut self, file_name: impl Into<String>) -> Self {
        self.files.push(ChangedFile::new(file_name));
        self
    }

    pub fn key(&self) -> CommitKey {
        CommitKey {
            project: self.project.clone(),
            commit_sha: self.commit_sha.clone(),
        }
    }

    /// First eight characters of the sha (or the whole sha when shorter).
    pub fn short_sha(&self) -> &str {
        short_sha(&self.commit_sha)
    }

    /// Copy without `before` payloads, used when persisting commit lists.
    pub fn without_content(&self) -> Self {
        Self {
            project: self.project.clone(),
            commit_sha: self.commit_sha.clone(),
            files: self
                .files
                .iter()
                .map(|f| ChangedFile::new(f.file_name.clone()))
                .collect(),
        }
    }

    /// Changed `.java` paths in dataset order.
    pub fn java_files(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .filter(|f| f.is_java())
            .map(|f| f.file_name.as_str())
    }
}

/// Identity of a commit across tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitKey {
    pub project: String,
    pub commit_sha: String,
}

impl fmt::Display for CommitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.project, short_sha(&self.commit_sha))
    }
}

pub(crate) fn short_sha(sha: &str) -> &str {
    match sha.char_indices().nth(8) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}
