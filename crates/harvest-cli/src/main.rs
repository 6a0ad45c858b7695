//! testharvest CLI
//!
//! The `harvest` command runs the test acquisition pipeline over a commit
//! dataset:
//!
//! - tier 1: tests that already exist next to the changed sources
//! - tier 2: any test in the changed files' test packages
//! - tier 3: Maven build plus EvoSuite, with Randoop as fallback

use anyhow::{Context, Result};
use clap::Parser;
use harvest_core::{init_tracing, CommandRunner, GitCli, SystemRunner, Tier};
use harvest_pipeline::toolchain::RANDOOP_URL;
use harvest_pipeline::{
    ensure_jar, EvoSuiteGenerator, GenerationBackends, MavenBuilder, PipelineConfig,
    PipelineSequencer, RandoopGenerator, TierSelection, Toolchain,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find or generate unit tests for every commit of a dataset", long_about = None)]
struct Cli {
    /// JSON Lines dataset of commits
    #[arg(long, env = "HARVEST_DATASET")]
    dataset: PathBuf,

    /// Process at most this many commits (0 = all)
    #[arg(long, env = "HARVEST_LIMIT")]
    limit: Option<usize>,

    /// Directory receiving every tier's artifacts
    #[arg(long, env = "HARVEST_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory holding cloned repositories
    #[arg(long, env = "HARVEST_REPOS_DIR")]
    repos_dir: Option<PathBuf>,

    /// Directory holding the JDK, Maven and generator jars
    #[arg(long, env = "HARVEST_TOOLS_DIR")]
    tools_dir: Option<PathBuf>,

    /// Run a single tier (1, 2 or 3) instead of all of them
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    tier: Option<u8>,

    /// JSON config file; flags override its values
    #[arg(long, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,
}

impl Cli {
    /// File config (or defaults) with command-line overrides applied.
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(limit) = self.limit {
            config.limit = (limit > 0).then_some(limit);
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.repos_dir {
            config.repo.repos_dir = dir.clone();
        }
        if let Some(dir) = &self.tools_dir {
            config.tools_dir = dir.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let config = cli.pipeline_config()?;
    let selection = TierSelection::from_flag(cli.tier)?;
    info!(
        dataset = %cli.dataset.display(),
        output_dir = %config.output_dir.display(),
        tools_dir = %config.tools_dir.display(),
        "testharvest starting"
    );

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let git = Arc::new(GitCli::new(runner.clone(), config.repo.git));

    let toolchain = Toolchain::discover(
        &config.tools_dir,
        runner.as_ref(),
        config.generation.which_timeout_secs,
    )
    .await;
    if selection.includes(Tier::FallbackGeneration) {
        if let Err(e) = ensure_jar(&toolchain.randoop_jar, RANDOOP_URL).await {
            warn!(error = %e, "Randoop jar unavailable, fallback generation will be skipped");
        }
    }

    let backends = GenerationBackends {
        builder: Arc::new(MavenBuilder::new(runner.clone(), &toolchain, config.build.clone())),
        primary: Arc::new(EvoSuiteGenerator::new(runner.clone(), &toolchain, &config.generation)),
        fallback: Arc::new(RandoopGenerator::new(runner.clone(), &toolchain, &config.generation)),
    };

    let output_dir = config.output_dir.clone();
    let mut sequencer = PipelineSequencer::new(config, git, backends);
    let summary = sequencer.run(&cli.dataset, selection).await?;

    println!(
        "{} tests across {} tiers, summary in {}",
        summary.total_tests,
        summary.tier_summaries.len(),
        output_dir.display()
    );
    Ok(())
}
