//! Extracted test records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::commit::CommitKey;

/// Which recognizer produced a test method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestConvention {
    /// `@Test`-annotated method.
    Annotation,
    /// `testXxx()` method in a `TestCase` subclass.
    Legacy,
}

impl TestConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestConvention::Annotation => "annotation",
            TestConvention::Legacy => "legacy",
        }
    }
}

/// Pipeline tier that produced a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "tier1")]
    Historical,
    #[serde(rename = "tier2")]
    TreeSearch,
    #[serde(rename = "tier3a")]
    PrimaryGeneration,
    #[serde(rename = "tier3b")]
    FallbackGeneration,
}

impl Tier {
    /// Stable label used in artifacts and the final summary.
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Historical => "tier1",
            Tier::TreeSearch => "tier2",
            Tier::PrimaryGeneration => "tier3a",
            Tier::FallbackGeneration => "tier3b",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single test method traced back to the commit it was harvested for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTest {
    /// SHA-256 over project, commit, fqcn and method name.
    pub test_id: String,
    pub project: String,
    pub commit_sha: String,
    pub method_name: String,
    /// Source from the start of the method declaration through its closing brace.
    pub code: String,
    pub file_path: String,
    pub annotation: TestConvention,
    pub package: Option<String>,
    pub class_name: String,
    pub fqcn: String,
    pub tier: Tier,
}

impl ExtractedTest {
    /// Stable identifier for a test method harvested for a commit.
    pub fn compute_id(key: &CommitKey, fqcn: &str, method_name: &str) -> String {
        let mut hasher = Sha256::new();
        for part in [
            key.project.as_str(),
            key.commit_sha.as_str(),
            fqcn,
            method_name,
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    pub fn commit_key(&self) -> CommitKey {
        CommitKey {
            project: self.project.clone(),
            commit_sha: self.commit_sha.clone(),
        }
    }
}
