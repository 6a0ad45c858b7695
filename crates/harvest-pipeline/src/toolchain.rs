//! JDK, Maven and generator jar discovery.

use harvest_core::process::{CommandRunner, CommandSpec};
use harvest_core::{HarvestError, HarvestResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const EVOSUITE_JAR: &str = "evosuite-1.2.0.jar";
pub const RANDOOP_JAR: &str = "randoop-all-4.3.2.jar";
pub const RANDOOP_URL: &str =
    "https://github.com/randoop/randoop/releases/download/v4.3.2/randoop-all-4.3.2.jar";

const LOCAL_JDKS: [&str; 2] = ["jdk8", "jdk11"];
const LOCAL_MAVEN: &str = "apache-maven-3.6.3";

/// Resolved external tools for tier 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// JDK root; `None` means rely on `java` from `PATH`.
    pub java_home: Option<PathBuf>,
    /// Maven executable.
    pub maven: String,
    pub evosuite_jar: PathBuf,
    pub randoop_jar: PathBuf,
}

impl Toolchain {
    /// Discover tools under `tools_dir`, then `JAVA_HOME`, then `PATH`.
    pub async fn discover(tools_dir: &Path, runner: &dyn CommandRunner, which_timeout_secs: u64) -> Self {
        let java_home_env = std::env::var_os("JAVA_HOME").map(PathBuf::from);
        Self::discover_with(tools_dir, java_home_env, runner, which_timeout_secs).await
    }

    pub async fn discover_with(
        tools_dir: &Path,
        java_home_env: Option<PathBuf>,
        runner: &dyn CommandRunner,
        which_timeout_secs: u64,
    ) -> Self {
        let java_home = find_java_home(tools_dir, java_home_env, runner, which_timeout_secs).await;
        let maven = find_maven(tools_dir, runner, which_timeout_secs).await;
        let evosuite_jar = tools_dir.join(EVOSUITE_JAR);
        if !evosuite_jar.is_file() {
            warn!(path = %evosuite_jar.display(), "EvoSuite jar not found");
        }
        let toolchain = Self {
            java_home,
            maven,
            evosuite_jar,
            randoop_jar: tools_dir.join(RANDOOP_JAR),
        };
        info!(
            java_home = ?toolchain.java_home,
            maven = %toolchain.maven,
            "toolchain resolved"
        );
        toolchain
    }

    /// `java` executable of the discovered JDK.
    pub fn java(&self) -> String {
        match &self.java_home {
            Some(home) => home.join("bin").join("java").display().to_string(),
            None => "java".to_string(),
        }
    }

    /// Environment overrides pointing Maven at the discovered JDK.
    ///
    /// A JDK rooted at `/usr` is the system one and needs no override.
    pub fn maven_env(&self) -> Vec<(String, String)> {
        let Some(home) = &self.java_home else {
            return Vec::new();
        };
        if home == Path::new("/usr") {
            return Vec::new();
        }
        let resolved = std::fs::canonicalize(home).unwrap_or_else(|_| home.clone());
        let mut path = home.join("bin").display().to_string();
        if let Some(existing) = std::env::var_os("PATH") {
            path.push(':');
            path.push_str(&existing.to_string_lossy());
        }
        vec![
            ("JAVA_HOME".to_string(), resolved.display().to_string()),
            ("PATH".to_string(), path),
        ]
    }
}

fn has_java(home: &Path) -> bool {
    home.join("bin").join("java").exists()
}

async fn which(runner: &dyn CommandRunner, program: &str, timeout_secs: u64) -> Option<PathBuf> {
    let spec = CommandSpec::new("which").arg(program).with_timeout(timeout_secs);
    match runner.run(&spec).await {
        Ok(out) if out.success() && !out.stdout.trim().is_empty() => {
            Some(PathBuf::from(out.stdout.trim()))
        }
        Ok(_) => None,
        Err(e) => {
            debug!(program = %program, error = %e, "which failed");
            None
        }
    }
}

async fn find_java_home(
    tools_dir: &Path,
    java_home_env: Option<PathBuf>,
    runner: &dyn CommandRunner,
    which_timeout_secs: u64,
) -> Option<PathBuf> {
    for name in LOCAL_JDKS {
        let home = tools_dir.join(name);
        if has_java(&home) {
            debug!(java_home = %home.display(), "using local JDK");
            return Some(home);
        }
    }
    if let Some(home) = java_home_env.filter(|h| has_java(h)) {
        debug!(java_home = %home.display(), "using JAVA_HOME");
        return Some(home);
    }
    // <home>/bin/java
    if let Some(home) = which(runner, "java", which_timeout_secs)
        .await
        .and_then(|java| java.parent()?.parent().map(Path::to_path_buf))
    {
        debug!(java_home = %home.display(), "using system java");
        return Some(home);
    }
    warn!("no JDK found in tools dir, JAVA_HOME or PATH");
    None
}

async fn find_maven(tools_dir: &Path, runner: &dyn CommandRunner, which_timeout_secs: u64) -> String {
    let local = tools_dir.join(LOCAL_MAVEN).join("bin").join("mvn");
    if local.exists() {
        return local.display().to_string();
    }
    if let Some(path) = which(runner, "mvn", which_timeout_secs).await {
        return path.display().to_string();
    }
    warn!("Maven not found, assuming mvn is on PATH");
    "mvn".to_string()
}

/// Download `url` to `path` unless the file is already present.
pub async fn ensure_jar(path: &Path, url: &str) -> HarvestResult<()> {
    if path.is_file() {
        return Ok(());
    }
    let network = |e: reqwest::Error| HarvestError::Network {
        url: url.to_string(),
        reason: e.to_string(),
    };

    info!(url = %url, dest = %path.display(), "downloading generator jar");
    let bytes = reqwest::get(url)
        .await
        .map_err(network)?
        .error_for_status()
        .map_err(network)?
        .bytes()
        .await
        .map_err(network)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = path.with_extension("jar.part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::fakes::ScriptedRunner;
    use harvest_core::CommandOutput;

    fn fake_jdk(root: &Path) -> PathBuf {
        let bin = root.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("java"), "").unwrap();
        root.to_path_buf()
    }

    #[tokio::test]
    async fn test_local_tools_win() {
        let tools = tempfile::tempdir().unwrap();
        fake_jdk(&tools.path().join("jdk11"));
        let mvn = tools.path().join("apache-maven-3.6.3").join("bin");
        std::fs::create_dir_all(&mvn).unwrap();
        std::fs::write(mvn.join("mvn"), "").unwrap();

        let runner = ScriptedRunner::succeeding();
        let tc = Toolchain::discover_with(tools.path(), None, &runner, 5).await;
        assert_eq!(tc.java_home, Some(tools.path().join("jdk11")));
        assert!(tc.maven.ends_with("apache-maven-3.6.3/bin/mvn"));
        assert_eq!(tc.evosuite_jar, tools.path().join(EVOSUITE_JAR));
        assert!(runner.calls().is_empty(), "no which lookups needed");
    }

    #[tokio::test]
    async fn test_java_home_env_then_which() {
        let tools = tempfile::tempdir().unwrap();
        let env_home = tempfile::tempdir().unwrap();
        fake_jdk(env_home.path());

        let runner = ScriptedRunner::new(|spec| {
            if spec.has_arg("mvn") {
                Ok(CommandOutput::ok("/opt/maven/bin/mvn\n"))
            } else {
                Ok(CommandOutput::ok("/usr/lib/jvm/java-11/bin/java\n"))
            }
        });
        let tc = Toolchain::discover_with(tools.path(), Some(env_home.path().to_path_buf()), &runner, 5).await;
        assert_eq!(tc.java_home.as_deref(), Some(env_home.path()));
        assert_eq!(tc.maven, "/opt/maven/bin/mvn");

        let tc = Toolchain::discover_with(tools.path(), None, &runner, 5).await;
        assert_eq!(tc.java_home, Some(PathBuf::from("/usr/lib/jvm/java-11")));
        assert_eq!(tc.java(), "/usr/lib/jvm/java-11/bin/java");
    }

    #[tokio::test]
    async fn test_nothing_found_falls_back_to_path() {
        let tools = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new(|_| Ok(CommandOutput::failed(1, "")));
        let tc = Toolchain::discover_with(tools.path(), None, &runner, 5).await;
        assert_eq!(tc.java_home, None);
        assert_eq!(tc.java(), "java");
        assert_eq!(tc.maven, "mvn");
        assert!(tc.maven_env().is_empty());
    }

    #[test]
    fn test_maven_env_skips_system_jdk() {
        let tc = Toolchain {
            java_home: Some(PathBuf::from("/usr")),
            maven: "mvn".into(),
            evosuite_jar: PathBuf::new(),
            randoop_jar: PathBuf::new(),
        };
        assert!(tc.maven_env().is_empty());

        let tc = Toolchain {
            java_home: Some(PathBuf::from("/opt/jdk8")),
            ..tc
        };
        let env = tc.maven_env();
        assert_eq!(env[0], ("JAVA_HOME".to_string(), "/opt/jdk8".to_string()));
        assert!(env[1].1.starts_with("/opt/jdk8/bin"));
    }

    #[tokio::test]
    async fn test_ensure_jar_present_is_noop() {
        let tools = tempfile::tempdir().unwrap();
        let jar = tools.path().join(RANDOOP_JAR);
        std::fs::write(&jar, b"PK").unwrap();
        ensure_jar(&jar, "http://127.0.0.1:9/unreachable.jar").await.unwrap();
        assert_eq!(std::fs::read(&jar).unwrap(), b"PK");
    }
}
