//! Child-process execution under wall-clock timeouts.
//!
//! Every external tool (git, mvn, java, which) goes through a
//! [`CommandRunner`]. The system implementation kills the child when the
//! timeout fires; tests substitute [`crate::fakes::ScriptedRunner`].

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::{HarvestError, HarvestResult};

/// A fully described child-process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,

    pub args: Vec<String>,

    /// Working directory, inherited when `None`.
    pub cwd: Option<PathBuf>,

    /// Environment overrides applied after `env_remove`.
    pub envs: Vec<(String, String)>,

    /// Variables removed from the inherited environment.
    pub env_remove: Vec<String>,

    /// Wall-clock timeout in seconds (0 = unbounded).
    pub timeout_secs: u64,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            env_remove: Vec::new(),
            timeout_secs: 0,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn without_env(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Whether the argument list contains `needle` verbatim.
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// Value following `flag` in the argument list.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len());
        text.push_str(&self.stdout);
        text.push_str(&self.stderr);
        text
    }

    /// Convenience constructor for scripted outputs.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// Convenience constructor for scripted failures.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
            ..Default::default()
        }
    }
}

/// Runs child processes.
///
/// A timeout is reported as [`HarvestError::Timeout`], a launch failure as
/// [`HarvestError::Spawn`]. Non-zero exits are not errors.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> HarvestResult<CommandOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> HarvestResult<CommandOutput> {
        let start = Instant::now();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for key in &spec.env_remove {
            cmd.env_remove(key);
        }
        for (key, value) in &spec.envs {
            cmd.env(key, value);
        }

        debug!(command = %spec.display(), timeout_secs = spec.timeout_secs, "spawning");
        let child = cmd.spawn().map_err(|source| HarvestError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        // Dropping the wait future drops the child, which kills it.
        let output = if spec.timeout_secs > 0 {
            match tokio::time::timeout(
                Duration::from_secs(spec.timeout_secs),
                child.wait_with_output(),
            )
            .await
            {
                Ok(res) => res?,
                Err(_) => {
                    warn!(
                        program = %spec.program,
                        timeout_secs = spec.timeout_secs,
                        "child process timed out, killed"
                    );
                    return Err(HarvestError::Timeout {
                        program: spec.program.clone(),
                        timeout_secs: spec.timeout_secs,
                    });
                }
            }
        } else {
            child.wait_with_output().await?
        };

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// First `max_chars` characters of `text`, for log excerpts.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `max_chars` characters of `text`.
pub fn tail_excerpt(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    match text.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("git")
            .with_args(["-C", "/tmp/repo", "rev-parse"])
            .arg("HEAD")
            .in_dir("/tmp")
            .with_env("A", "1")
            .without_env("GIT_DIR")
            .with_timeout(5);
        assert_eq!(spec.display(), "git -C /tmp/repo rev-parse HEAD");
        assert_eq!(spec.arg_after("-C"), Some("/tmp/repo"));
        assert!(spec.has_arg("HEAD"));
        assert_eq!(spec.timeout_secs, 5);
        assert_eq!(spec.env_remove, vec!["GIT_DIR".to_string()]);
    }

    #[test]
    fn test_output_combined() {
        let out = CommandOutput {
            exit_code: 1,
            stdout: "out ".into(),
            stderr: "Fatal crash".into(),
            duration_ms: 0,
        };
        assert!(!out.success());
        assert_eq!(out.combined(), "out Fatal crash");
    }

    #[test]
    fn test_excerpts_respect_char_boundaries() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("abc", 10), "abc");
        assert_eq!(tail_excerpt("héllo", 3), "llo");
        assert_eq!(tail_excerpt("ab", 3), "ab");
    }

    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let spec = CommandSpec::new("sh")
            .with_args(["-c", "echo hello; echo oops 1>&2; exit 3"])
            .with_timeout(30);
        let out = SystemRunner.run(&spec).await.expect("run failed");
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_system_runner_applies_env_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("sh")
            .with_args(["-c", "echo $HARVEST_MARKER; pwd"])
            .with_env("HARVEST_MARKER", "marker-value")
            .in_dir(dir.path())
            .with_timeout(30);
        let out = SystemRunner.run(&spec).await.unwrap();
        assert!(out.success());
        assert!(out.stdout.contains("marker-value"));
        let pwd = out.stdout.lines().nth(1).unwrap();
        assert_eq!(
            std::fs::canonicalize(pwd).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_system_runner_times_out() {
        let spec = CommandSpec::new("sleep").arg("5").with_timeout(1);
        let err = SystemRunner.run(&spec).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_system_runner_spawn_failure() {
        let spec = CommandSpec::new("definitely-not-a-real-binary-xyz").with_timeout(5);
        let err = SystemRunner.run(&spec).await.unwrap_err();
        assert!(matches!(err, HarvestError::Spawn { .. }));
    }
}
