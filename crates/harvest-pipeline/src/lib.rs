//! testharvest tier 3 and pipeline sequencing
//!
//! Maven build of checked-out commits, EvoSuite/Randoop generation over the
//! compiled classes, and the sequencer that runs all tiers in order and
//! writes the final summary.

pub mod build;
pub mod classes;
pub mod config;
pub mod generator;
pub mod orchestrator;
pub mod sequencer;
pub mod stage;
pub mod summary;
pub mod toolchain;

pub use build::{BuildOutput, MavenBuilder, ProjectBuilder};
pub use config::{BuildConfig, GenerationConfig, PipelineConfig};
pub use generator::{
    EvoSuiteGenerator, GenerationOutcome, GenerationRequest, RandoopGenerator, TestGenerator,
};
pub use orchestrator::{GenerationOrchestrator, GenerationReport};
pub use sequencer::{GenerationBackends, PipelineSequencer, TierSelection};
pub use stage::MavenGoal;
pub use summary::{FinalSummary, TierSummary};
pub use toolchain::{ensure_jar, Toolchain};
