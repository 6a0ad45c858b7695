//! testharvest core library
//!
//! Repository cache, path heuristics, the regex test recognizer and the two
//! history-mining tiers (historical locator and tree search), plus the
//! process and version-control seams the build-and-generate tier uses.

pub mod checkout;
pub mod dataset;
pub mod domain;
pub mod extract;
pub mod fakes;
pub mod locator;
pub mod obs;
pub mod paths;
pub mod process;
pub mod repo_cache;
pub mod reporting;
pub mod telemetry;
pub mod tree_search;
pub mod vcs;

pub use checkout::WorkingCheckout;
pub use dataset::{read_dataset, Dataset};
pub use domain::{
    ChangedFile, Commit, CommitKey, ExtractedTest, FailureReason, GenerationResult,
    GenerationStats, GenerationStatus, HarvestError, HarvestResult, TestConvention, Tier,
    Tier1Stats, Tier2Stats,
};
pub use extract::{extract_test_methods, harvest_file, TestMethod};
pub use locator::{CommitExtraction, HistoricalTestLocator, Tier1Report};
pub use process::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use repo_cache::{RepoConfig, RepoMode, RepositoryCache, RepositoryHandle};
pub use telemetry::init_tracing;
pub use tree_search::{Tier2Report, TreeSearchFallback};
pub use vcs::{GitCli, GitTimeouts, VersionControl};
