//! Pipeline configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. CLI flags are applied on top by the binary.

use harvest_core::{HarvestError, HarvestResult, RepoConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maven invocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// `install -N` of the root aggregator.
    pub root_install_timeout_secs: u64,
    /// `install -N` of a tooling directory.
    pub tooling_parent_timeout_secs: u64,
    /// `install` of a tooling directory.
    pub tooling_install_timeout_secs: u64,
    pub plugin_install_timeout_secs: u64,
    /// Scoped build and whole-project retry.
    pub build_timeout_secs: u64,
    pub classpath_timeout_secs: u64,
    /// Deepest pom (in path components) scanned for Maven plugins.
    pub plugin_scan_depth: usize,
    /// Directories pre-installed before a scoped build, in order.
    pub tooling_dirs: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root_install_timeout_secs: 120,
            tooling_parent_timeout_secs: 120,
            tooling_install_timeout_secs: 300,
            plugin_install_timeout_secs: 180,
            build_timeout_secs: 600,
            classpath_timeout_secs: 180,
            plugin_scan_depth: 5,
            tooling_dirs: ["tooling", "buildtools", "build-tools", "parent", "tooling/maven", "build"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Generator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// EvoSuite `search_budget` per class.
    pub search_budget_secs: u64,
    /// Wall-clock limit of one EvoSuite class run.
    pub class_timeout_secs: u64,
    /// Randoop `--time-limit`.
    pub fallback_time_limit_secs: u64,
    /// Wall-clock limit of the Randoop run.
    pub fallback_timeout_secs: u64,
    /// Classes handed to Randoop.
    pub fallback_class_limit: usize,
    /// Timeout for `which` during toolchain discovery.
    pub which_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            search_budget_secs: 60,
            class_timeout_secs: 120,
            fallback_time_limit_secs: 60,
            fallback_timeout_secs: 120,
            fallback_class_limit: 50,
            which_timeout_secs: 5,
        }
    }
}

/// Complete configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub tools_dir: PathBuf,
    /// Maximum number of dataset commits (`None` = all).
    pub limit: Option<usize>,
    pub repo: RepoConfig,
    pub build: BuildConfig,
    pub generation: GenerationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("pipeline_results"),
            tools_dir: PathBuf::from("tools"),
            limit: None,
            repo: RepoConfig::default(),
            build: BuildConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file; absent fields keep their defaults.
    pub fn load(path: &Path) -> HarvestResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| HarvestError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HarvestResult<()> {
        if !self.repo.remote_url_template.contains("{project}") {
            return Err(HarvestError::Config(
                "repo.remote_url_template must contain {project}".to_string(),
            ));
        }
        if self.generation.fallback_class_limit == 0 {
            return Err(HarvestError::Config(
                "generation.fallback_class_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory of a tier's artifacts under `output_dir`.
    pub fn tier_dir(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tool_budgets() {
        let config = PipelineConfig::default();
        assert_eq!(config.build.build_timeout_secs, 600);
        assert_eq!(config.build.tooling_dirs.len(), 6);
        assert_eq!(config.generation.class_timeout_secs, 120);
        assert_eq!(config.generation.fallback_class_limit, 50);
        assert_eq!(config.repo.git.clone_secs, 600);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{"output_dir":"/out","generation":{"search_budget_secs":30},"repo":{"remote_url_template":"file:///mirror/{project}"}}"#,
        )
        .unwrap();
        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/out"));
        assert_eq!(config.generation.search_budget_secs, 30);
        assert_eq!(config.generation.class_timeout_secs, 120);
        assert_eq!(config.repo.remote_url("x"), "file:///mirror/x");
        assert_eq!(config.tier_dir("tier1_extracted"), PathBuf::from("/out/tier1_extracted"));
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"repo":{"remote_url_template":"https://x/y.git"}}"#)
            .unwrap();
        let err = PipelineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }
}
