//! Per-tier counters.
//!
//! Counters only grow during a run. Call `flush()` at the end of a tier to
//! emit current values as a single `tracing::info!` event.

use serde::{Deserialize, Serialize};

/// Tier 1 (historical locator) counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier1Stats {
    pub commits_processed: u64,
    pub files_checked: u64,
    pub test_candidates_tried: u64,
    pub test_files_found: u64,
    pub test_methods_extracted: u64,
    pub commits_with_zero_tests: u64,
    pub clone_failures: u64,
    #[serde(default)]
    pub malformed_lines: u64,
}

impl Tier1Stats {
    pub fn flush(&self) {
        tracing::info!(
            metric = "tier1",
            commits_processed = self.commits_processed,
            files_checked = self.files_checked,
            test_candidates_tried = self.test_candidates_tried,
            test_files_found = self.test_files_found,
            test_methods_extracted = self.test_methods_extracted,
            commits_with_zero_tests = self.commits_with_zero_tests,
            clone_failures = self.clone_failures,
            malformed_lines = self.malformed_lines,
            "tier stats"
        );
    }
}

/// Tier 2 (tree search) counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier2Stats {
    pub checked: u64,
    pub recovered: u64,
    pub methods_recovered: u64,
    #[serde(default)]
    pub files_scanned: u64,
}

impl Tier2Stats {
    pub fn flush(&self) {
        tracing::info!(
            metric = "tier2",
            checked = self.checked,
            recovered = self.recovered,
            methods_recovered = self.methods_recovered,
            files_scanned = self.files_scanned,
            "tier stats"
        );
    }
}

/// Tier 3 counters, one instance per generator tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub commits_attempted: u64,
    pub commits_cloned: u64,
    pub commits_compiled: u64,
    pub tests_generated: u64,
    pub failures: u64,
    #[serde(default)]
    pub tool_crashes: u64,
    #[serde(default)]
    pub tool_timeouts: u64,
}

impl GenerationStats {
    pub fn flush(&self, tool: &str) {
        tracing::info!(
            metric = "tier3",
            tool = %tool,
            commits_attempted = self.commits_attempted,
            commits_cloned = self.commits_cloned,
            commits_compiled = self.commits_compiled,
            tests_generated = self.tests_generated,
            failures = self.failures,
            tool_crashes = self.tool_crashes,
            tool_timeouts = self.tool_timeouts,
            "tier stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default_zero() {
        let s = Tier1Stats::default();
        assert_eq!(s.commits_processed, 0);
        assert_eq!(s.malformed_lines, 0);
        s.flush();
    }

    #[test]
    fn test_stats_deserialize_without_expanded_fields() {
        let json = r#"{"checked":3,"recovered":1,"methods_recovered":4}"#;
        let s: Tier2Stats = serde_json::from_str(json).unwrap();
        assert_eq!(s.recovered, 1);
        assert_eq!(s.files_scanned, 0);
    }

    #[test]
    fn test_generation_stats_serialize_field_names() {
        let s = GenerationStats {
            commits_attempted: 2,
            failures: 1,
            ..Default::default()
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["commits_attempted"], 2);
        assert_eq!(v["failures"], 1);
        assert_eq!(v["tool_timeouts"], 0);
    }
}
