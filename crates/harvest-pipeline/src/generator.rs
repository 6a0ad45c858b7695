//! Automated unit-test generators run against compiled classes.

use async_trait::async_trait;
use harvest_core::process::{excerpt, tail_excerpt, CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::GenerationConfig;
use crate::toolchain::Toolchain;

/// Output markers of an EvoSuite run that will fail for every class.
const CRASH_MARKERS: [&str; 2] = ["Fatal crash", "NullPointerException"];

const CLASSLIST_FILE: &str = "classlist.txt";

/// Inputs of one generator run.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub classpath: &'a str,
    /// Target FQCNs in priority order.
    pub classes: &'a [String],
    /// Existing, empty directory receiving the generated sources.
    pub out_dir: &'a Path,
}

/// What a generator run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// Generated test sources under `out_dir`.
    pub test_files: Vec<PathBuf>,
    pub classes_attempted: usize,
    /// The tool crashed and the remaining classes were abandoned.
    pub crashed: bool,
    pub timeouts: u64,
    /// The generator jar was not available.
    pub tool_missing: bool,
}

impl GenerationOutcome {
    fn missing() -> Self {
        Self {
            tool_missing: true,
            ..Default::default()
        }
    }

    pub fn tests_generated(&self) -> u64 {
        self.test_files.len() as u64
    }
}

/// A unit-test generator.
///
/// Generator failures are folded into the [`GenerationOutcome`]; they never
/// abort the commit or the run.
#[async_trait]
pub trait TestGenerator: Send + Sync {
    /// Tool name recorded in results.
    fn tool(&self) -> &'static str;

    async fn generate(&self, request: &GenerationRequest<'_>) -> GenerationOutcome;
}

fn java_files(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().is_some_and(|n| n.ends_with(suffix)))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

// ---------------------------------------------------------------------------
// EvoSuite
// ---------------------------------------------------------------------------

/// Primary generator: EvoSuite, one class at a time until a class yields tests.
pub struct EvoSuiteGenerator {
    runner: Arc<dyn CommandRunner>,
    java: String,
    jar: PathBuf,
    search_budget_secs: u64,
    class_timeout_secs: u64,
}

impl EvoSuiteGenerator {
    pub fn new(runner: Arc<dyn CommandRunner>, toolchain: &Toolchain, config: &GenerationConfig) -> Self {
        Self {
            runner,
            java: toolchain.java(),
            jar: toolchain.evosuite_jar.clone(),
            search_budget_secs: config.search_budget_secs,
            class_timeout_secs: config.class_timeout_secs,
        }
    }

    fn command(&self, class_name: &str, request: &GenerationRequest<'_>) -> CommandSpec {
        CommandSpec::new(&self.java)
            .arg("-jar")
            .arg(self.jar.display().to_string())
            .with_args(["-class", class_name])
            .with_args(["-projectCP", request.classpath])
            .arg("-Dsearch_budget")
            .arg(self.search_budget_secs.to_string())
            .with_args(["-Dassertion_strategy", "all"])
            .arg("-Dtest_dir")
            .arg(request.out_dir.display().to_string())
            .with_args(["-Dtest_comments", "false"])
            .with_timeout(self.class_timeout_secs)
    }
}

#[async_trait]
impl TestGenerator for EvoSuiteGenerator {
    fn tool(&self) -> &'static str {
        "evosuite"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> GenerationOutcome {
        if !self.jar.is_file() {
            warn!(jar = %self.jar.display(), "EvoSuite jar not found");
            return GenerationOutcome::missing();
        }

        let mut outcome = GenerationOutcome::default();
        for class_name in request.classes {
            outcome.classes_attempted += 1;
            debug!(class = %class_name, "evosuite: generating");

            let out = match self.runner.run(&self.command(class_name, request)).await {
                Ok(out) => out,
                Err(e) if e.is_timeout() => {
                    warn!(class = %class_name, "evosuite timed out");
                    outcome.timeouts += 1;
                    continue;
                }
                Err(e) => {
                    warn!(class = %class_name, error = %e, "evosuite did not run");
                    continue;
                }
            };

            if out.success() {
                let files = java_files(request.out_dir, "_ESTest.java");
                if !files.is_empty() {
                    debug!(files = files.len(), "evosuite generated tests");
                    outcome.test_files = files;
                    break;
                }
                continue;
            }

            let combined = out.combined();
            if CRASH_MARKERS.iter().any(|m| combined.contains(m)) {
                warn!(class = %class_name, "evosuite crashed, abandoning remaining classes");
                outcome.crashed = true;
                break;
            }
            warn!(class = %class_name, exit_code = out.exit_code, "evosuite failed");
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Randoop
// ---------------------------------------------------------------------------

/// Fallback generator: one Randoop run over a bounded class list.
pub struct RandoopGenerator {
    runner: Arc<dyn CommandRunner>,
    java: String,
    jar: PathBuf,
    time_limit_secs: u64,
    timeout_secs: u64,
    class_limit: usize,
}

impl RandoopGenerator {
    pub fn new(runner: Arc<dyn CommandRunner>, toolchain: &Toolchain, config: &GenerationConfig) -> Self {
        Self {
            runner,
            java: toolchain.java(),
            jar: toolchain.randoop_jar.clone(),
            time_limit_secs: config.fallback_time_limit_secs,
            timeout_secs: config.fallback_timeout_secs,
            class_limit: config.fallback_class_limit,
        }
    }
}

#[async_trait]
impl TestGenerator for RandoopGenerator {
    fn tool(&self) -> &'static str {
        "randoop"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> GenerationOutcome {
        if !self.jar.is_file() {
            warn!(jar = %self.jar.display(), "Randoop jar not found");
            return GenerationOutcome::missing();
        }

        let classes = &request.classes[..request.classes.len().min(self.class_limit)];
        let mut outcome = GenerationOutcome {
            classes_attempted: classes.len(),
            ..Default::default()
        };

        let classlist = request.out_dir.join(CLASSLIST_FILE);
        if let Err(e) = tokio::fs::write(&classlist, classes.join("\n")).await {
            warn!(path = %classlist.display(), error = %e, "cannot write class list");
            return outcome;
        }

        let spec = CommandSpec::new(&self.java)
            .arg("-cp")
            .arg(format!("{}:{}", self.jar.display(), request.classpath))
            .with_args(["randoop.main.Main", "gentests"])
            .arg(format!("--classlist={}", classlist.display()))
            .arg(format!("--time-limit={}", self.time_limit_secs))
            .arg(format!("--junit-output-dir={}", request.out_dir.display()))
            .with_timeout(self.timeout_secs);

        debug!(classes = classes.len(), time_limit_secs = self.time_limit_secs, "randoop: generating");
        match self.runner.run(&spec).await {
            Ok(out) if !out.success() => {
                warn!(
                    exit_code = out.exit_code,
                    stderr = %excerpt(&out.stderr, 300),
                    "randoop failed"
                );
                debug!(stdout = %tail_excerpt(&out.stdout, 300), "randoop stdout");
            }
            Ok(_) => {}
            Err(e) if e.is_timeout() => {
                warn!("randoop timed out");
                outcome.timeouts += 1;
            }
            Err(e) => warn!(error = %e, "randoop did not run"),
        }

        // a timed-out run may still have flushed some suites
        outcome.test_files = java_files(request.out_dir, ".java");
        if outcome.test_files.is_empty() {
            warn!("randoop produced no test files");
        }
        outcome
    }
}
