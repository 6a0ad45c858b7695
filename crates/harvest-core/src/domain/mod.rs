//! Domain models for testharvest.
//!
//! Canonical definitions for the core entities:
//! - `Commit`: one dataset record with its changed files
//! - `ExtractedTest`: a test method found in history or in generated sources
//! - `GenerationResult`: terminal state of a tier-3 generator run for a commit
//! - Per-tier statistics counters

pub mod commit;
pub mod error;
pub mod extracted;
pub mod generation;
pub mod stats;

// Re-export main types and errors
pub use commit::{ChangedFile, Commit, CommitKey};
pub use error::{HarvestError, HarvestResult};
pub use extracted::{ExtractedTest, TestConvention, Tier};
pub use generation::{FailureReason, GenerationResult, GenerationStatus};
pub use stats::{GenerationStats, Tier1Stats, Tier2Stats};
