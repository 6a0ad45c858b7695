//! Maven build of a checked-out commit.
//!
//! The build is best-effort in stages: the root aggregator and any in-repo
//! build tooling or Maven plugins are installed first, then the module that
//! holds the commit's changes (or the whole project) is built. Success is
//! judged by the presence of `target/classes` directories, not by the exit
//! code, since `-fn` keeps Maven going past failing modules.

use async_trait::async_trait;
use harvest_core::process::{tail_excerpt, CommandOutput, CommandRunner, CommandSpec};
use harvest_core::{HarvestError, HarvestResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::BuildConfig;
use crate::stage::MavenGoal;
use crate::toolchain::Toolchain;

const POM: &str = "pom.xml";
const PLUGIN_PACKAGING: &str = "<packaging>maven-plugin</packaging>";

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Directory holding the root `pom.xml`.
    pub compile_dir: PathBuf,
    /// Every `target/classes` directory found, sorted.
    pub classes_dirs: Vec<PathBuf>,
    /// `:`-joined class directories followed by dependency jars.
    pub classpath: String,
}

/// Compiles a checkout and reports its classpath.
#[async_trait]
pub trait ProjectBuilder: Send + Sync {
    async fn build(&self, checkout: &Path, target_module: Option<&str>) -> HarvestResult<BuildOutput>;
}

/// [`ProjectBuilder`] driving `mvn` through a [`CommandRunner`].
pub struct MavenBuilder {
    runner: Arc<dyn CommandRunner>,
    maven: String,
    env: Vec<(String, String)>,
    config: BuildConfig,
}

impl MavenBuilder {
    pub fn new(runner: Arc<dyn CommandRunner>, toolchain: &Toolchain, config: BuildConfig) -> Self {
        Self {
            runner,
            maven: toolchain.maven.clone(),
            env: toolchain.maven_env(),
            config,
        }
    }

    /// Run one goal; a timeout or launch failure yields `None`.
    async fn run_goal(&self, dir: &Path, goal: &MavenGoal, timeout_secs: u64) -> Option<CommandOutput> {
        let mut spec = CommandSpec::new(&self.maven)
            .with_args(goal.args())
            .in_dir(dir)
            .with_timeout(timeout_secs);
        for (key, value) in &self.env {
            spec = spec.with_env(key, value);
        }

        debug!(goal = goal.name(), dir = %dir.display(), "running maven");
        match self.runner.run(&spec).await {
            Ok(out) => {
                if !out.success() {
                    debug!(
                        goal = goal.name(),
                        exit_code = out.exit_code,
                        stderr = %tail_excerpt(&out.stderr, 400),
                        "maven goal exited non-zero"
                    );
                }
                Some(out)
            }
            Err(e) => {
                warn!(goal = goal.name(), error = %e, "maven goal did not complete");
                None
            }
        }
    }

    async fn install_tooling(&self, compile_dir: &Path) {
        for name in &self.config.tooling_dirs {
            let pom = compile_dir.join(name).join(POM);
            if !pom.is_file() {
                continue;
            }
            debug!(tooling = %name, "pre-installing build tooling");
            self.run_goal(
                compile_dir,
                &MavenGoal::InstallParentOnly(pom.clone()),
                self.config.tooling_parent_timeout_secs,
            )
            .await;
            self.run_goal(
                compile_dir,
                &MavenGoal::InstallPom(pom),
                self.config.tooling_install_timeout_secs,
            )
            .await;
        }

        let plugins = find_plugin_poms(compile_dir, self.config.plugin_scan_depth);
        for pom in plugins {
            debug!(pom = %pom.display(), "installing maven plugin module");
            self.run_goal(
                compile_dir,
                &MavenGoal::InstallPom(pom),
                self.config.plugin_install_timeout_secs,
            )
            .await;
        }
    }

    async fn resolve_classpath(&self, compile_dir: &Path, cp_dir: &Path, classes_dirs: &[PathBuf]) -> String {
        let dirs: Vec<String> = classes_dirs.iter().map(|d| d.display().to_string()).collect();
        let pom = cp_dir.join(POM);
        if pom.is_file() {
            if let Some(out) = self
                .run_goal(
                    compile_dir,
                    &MavenGoal::BuildClasspath(pom),
                    self.config.classpath_timeout_secs,
                )
                .await
            {
                let deps = out.stdout.trim();
                if out.success() && !deps.is_empty() {
                    debug!(class_dirs = dirs.len(), "classpath resolved with dependencies");
                    let mut parts = dirs;
                    parts.push(deps.to_string());
                    return parts.join(":");
                }
            }
        }
        warn!(class_dirs = dirs.len(), "using class directories only as classpath");
        dirs.join(":")
    }
}

#[async_trait]
impl ProjectBuilder for MavenBuilder {
    async fn build(&self, checkout: &Path, target_module: Option<&str>) -> HarvestResult<BuildOutput> {
        // maven runs inside compile_dir, so every -f path must be absolute
        let checkout = std::fs::canonicalize(checkout)?;
        let compile_dir = find_root_pom(&checkout)
            .ok_or_else(|| HarvestError::Build(format!("no pom.xml under {}", checkout.display())))?;
        info!(compile_dir = %compile_dir.display(), module = ?target_module, "building");

        self.run_goal(
            &compile_dir,
            &MavenGoal::InstallAggregator,
            self.config.root_install_timeout_secs,
        )
        .await;

        let goal = match target_module {
            Some(module) => {
                self.install_tooling(&compile_dir).await;
                if compile_dir.join(module).join(POM).is_file() {
                    MavenGoal::InstallModule(module.to_string())
                } else {
                    warn!(module = %module, "module pom.xml missing, building whole project");
                    MavenGoal::InstallAll
                }
            }
            None => MavenGoal::Compile,
        };
        let mut last = self
            .run_goal(&compile_dir, &goal, self.config.build_timeout_secs)
            .await;

        let search_dir = match target_module {
            Some(module) => compile_dir.join(module),
            None => compile_dir.clone(),
        };
        let mut classes_dirs = find_classes_dirs(&search_dir);

        if classes_dirs.is_empty() && target_module.is_some() {
            warn!("module build produced no classes, building whole project");
            last = self
                .run_goal(&compile_dir, &MavenGoal::InstallAll, self.config.build_timeout_secs)
                .await;
            classes_dirs = find_classes_dirs(&search_dir);
        }

        if classes_dirs.is_empty() {
            if let Some(out) = &last {
                let errors: Vec<&str> = out
                    .stdout
                    .lines()
                    .filter(|l| l.contains("ERROR") || l.contains("FATAL"))
                    .take(10)
                    .collect();
                if !errors.is_empty() {
                    error!(errors = %errors.join("\n"), "maven errors");
                }
                error!(exit_code = out.exit_code, "no target/classes after build");
            }
            return Err(HarvestError::Build(format!(
                "no target/classes under {}",
                search_dir.display()
            )));
        }

        debug!(class_dirs = classes_dirs.len(), "build produced classes");
        let classpath = self
            .resolve_classpath(&compile_dir, &search_dir, &classes_dirs)
            .await;
        Ok(BuildOutput {
            compile_dir,
            classes_dirs,
            classpath,
        })
    }
}

fn not_git(entry: &walkdir::DirEntry) -> bool {
    entry.file_name() != ".git"
}

/// Directory of the shallowest `pom.xml`, preferring the checkout root.
pub fn find_root_pom(checkout: &Path) -> Option<PathBuf> {
    if checkout.join(POM).is_file() {
        return Some(checkout.to_path_buf());
    }
    WalkDir::new(checkout)
        .into_iter()
        .filter_entry(not_git)
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name() == POM)
        .min_by(|a, b| a.depth().cmp(&b.depth()).then_with(|| a.path().cmp(b.path())))
        .and_then(|e| e.path().parent().map(Path::to_path_buf))
}

/// Every `target/classes` directory under `root`, sorted.
pub fn find_classes_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(not_git)
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir() && e.file_name() == "classes")
        .filter(|e| {
            e.path()
                .parent()
                .and_then(Path::file_name)
                .is_some_and(|p| p == "target")
        })
        .map(|e| e.into_path())
        .collect();
    dirs.sort();
    dirs
}

/// Poms within `max_depth` path components that package a Maven plugin.
fn find_plugin_poms(compile_dir: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut poms: Vec<PathBuf> = WalkDir::new(compile_dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(not_git)
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name() == POM)
        .filter(|e| {
            std::fs::read_to_string(e.path())
                .map(|content| content.contains(PLUGIN_PACKAGING))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    poms.sort();
    poms
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::fakes::ScriptedRunner;

    fn toolchain() -> Toolchain {
        Toolchain {
            java_home: None,
            maven: "mvn".into(),
            evosuite_jar: PathBuf::from("evosuite.jar"),
            randoop_jar: PathBuf::from("randoop.jar"),
        }
    }

    fn touch(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_find_root_pom_prefers_shallowest() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/b/pom.xml"), "<project/>");
        touch(&dir.path().join("z/pom.xml"), "<project/>");
        assert_eq!(find_root_pom(dir.path()), Some(dir.path().join("z")));

        touch(&dir.path().join("pom.xml"), "<project/>");
        assert_eq!(find_root_pom(dir.path()), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_find_classes_dirs_requires_target_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("core/target/classes")).unwrap();
        std::fs::create_dir_all(dir.path().join("api/target/classes")).unwrap();
        std::fs::create_dir_all(dir.path().join("docs/classes")).unwrap();
        let found = find_classes_dirs(dir.path());
        assert_eq!(
            found,
            vec![
                dir.path().join("api/target/classes"),
                dir.path().join("core/target/classes"),
            ]
        );
    }

    #[test]
    fn test_plugin_poms_respect_depth() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = "<project><packaging>maven-plugin</packaging></project>";
        touch(&dir.path().join("tools/gen/pom.xml"), plugin);
        touch(&dir.path().join("a/b/c/d/e/pom.xml"), plugin);
        touch(&dir.path().join("lib/pom.xml"), "<project><packaging>jar</packaging></project>");
        assert_eq!(
            find_plugin_poms(dir.path(), 5),
            vec![dir.path().join("tools/gen/pom.xml")]
        );
    }

    /// `path` spelled relative to the test's working directory.
    fn relative_to_cwd(path: &Path) -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        let mut rel = PathBuf::new();
        for _ in cwd.components().skip(1) {
            rel.push("..");
        }
        rel.join(path.strip_prefix("/").unwrap())
    }

    #[tokio::test]
    async fn test_whole_project_compile_with_classpath() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("pom.xml"), "<project/>");
        let classes = root.join("target/classes");

        let created = classes.clone();
        let runner = Arc::new(ScriptedRunner::new(move |spec| {
            if spec.has_arg("compile") {
                std::fs::create_dir_all(&created).unwrap();
            }
            if spec.has_arg("dependency:build-classpath") {
                return Ok(CommandOutput::ok("/m2/a.jar:/m2/b.jar\n"));
            }
            Ok(CommandOutput::ok(""))
        }));
        let builder = MavenBuilder::new(runner.clone(), &toolchain(), BuildConfig::default());
        let out = builder.build(&root, None).await.unwrap();

        assert_eq!(out.compile_dir, root);
        assert_eq!(out.classes_dirs, vec![classes.clone()]);
        assert_eq!(out.classpath, format!("{}:/m2/a.jar:/m2/b.jar", classes.display()));

        let goals: Vec<String> = runner.calls().iter().map(|c| c.args[0].clone()).collect();
        assert_eq!(goals, vec!["install", "compile", "dependency:build-classpath"]);
        assert!(runner.calls().iter().all(|c| c.cwd.as_deref() == Some(root.as_path())));
    }

    #[tokio::test]
    async fn test_module_build_retries_whole_project() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("pom.xml"), "<project/>");
        touch(&root.join("core/pom.xml"), "<project/>");
        touch(&root.join("tooling/pom.xml"), "<project/>");

        let created = root.join("core/target/classes");
        let runner = Arc::new(ScriptedRunner::new(move |spec| {
            // only the unscoped install produces classes
            if spec.args.first().map(String::as_str) == Some("install")
                && !spec.has_arg("-pl")
                && !spec.has_arg("-N")
                && !spec.has_arg("-f")
            {
                std::fs::create_dir_all(&created).unwrap();
            }
            Ok(CommandOutput::failed(1, ""))
        }));
        let builder = MavenBuilder::new(runner.clone(), &toolchain(), BuildConfig::default());
        let out = builder.build(&root, Some("core")).await.unwrap();
        assert_eq!(out.classes_dirs, vec![root.join("core/target/classes")]);
        // classpath goal failed, class dirs only
        assert_eq!(out.classpath, root.join("core/target/classes").display().to_string());

        let scoped = runner.calls_matching(|c| c.has_arg("-pl"));
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].arg_after("-pl"), Some("core"));
        let tooling = runner.calls_matching(|c| c.arg_after("-f").is_some_and(|p| p.ends_with("tooling/pom.xml")));
        assert_eq!(tooling.len(), 2, "parent-only then full tooling install");
    }

    #[tokio::test]
    async fn test_relative_checkout_passes_absolute_poms() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("pom.xml"), "<project/>");
        touch(&root.join("core/pom.xml"), "<project/>");
        touch(&root.join("tooling/pom.xml"), "<project/>");
        touch(
            &root.join("plugins/gen/pom.xml"),
            "<project><packaging>maven-plugin</packaging></project>",
        );

        let created = root.join("core/target/classes");
        let made = created.clone();
        let runner = Arc::new(ScriptedRunner::new(move |spec| {
            if spec.has_arg("-pl") {
                std::fs::create_dir_all(&made).unwrap();
            }
            Ok(CommandOutput::ok(""))
        }));
        let builder = MavenBuilder::new(runner.clone(), &toolchain(), BuildConfig::default());

        let checkout = relative_to_cwd(&root);
        assert!(checkout.is_relative());
        let out = builder.build(&checkout, Some("core")).await.unwrap();
        assert_eq!(out.compile_dir, root);
        assert_eq!(out.classes_dirs, vec![created]);

        // tooling parent + tooling, plugin, classpath
        let with_pom = runner.calls_matching(|c| c.has_arg("-f"));
        assert_eq!(with_pom.len(), 4);
        for call in &with_pom {
            let pom = Path::new(call.arg_after("-f").unwrap());
            assert!(pom.is_absolute(), "{}", pom.display());
            let cwd = call.cwd.as_deref().unwrap();
            assert_eq!(cwd, root.as_path());
            assert!(cwd.join(pom).is_file(), "{} missing", pom.display());
        }
    }

    #[tokio::test]
    async fn test_no_classes_is_build_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("pom.xml"), "<project/>");
        let runner = Arc::new(ScriptedRunner::new(|_| {
            Ok(CommandOutput::ok("[ERROR] cannot find symbol\n[INFO] done"))
        }));
        let builder = MavenBuilder::new(runner.clone(), &toolchain(), BuildConfig::default());
        let err = builder.build(dir.path(), Some("core")).await.unwrap_err();
        assert!(matches!(err, HarvestError::Build(_)));
        // aggregator, missing-module install, whole-project retry
        assert_eq!(runner.calls().len(), 3);
        assert!(runner.calls_matching(|c| c.has_arg("dependency:build-classpath")).is_empty());
    }

    #[tokio::test]
    async fn test_missing_pom_fails_without_running_maven() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::succeeding());
        let builder = MavenBuilder::new(runner.clone(), &toolchain(), BuildConfig::default());
        assert!(builder.build(dir.path(), None).await.is_err());
        assert!(runner.calls().is_empty());
    }
}
