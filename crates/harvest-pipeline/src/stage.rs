//! Maven goal definitions.

use std::path::PathBuf;

/// Flags carried by every build invocation: skip tests, docs and every
/// static-analysis gate, never fail fast, batch mode, force snapshot updates.
pub const SKIP_FLAGS: [&str; 13] = [
    "-DskipTests",
    "-Dmaven.test.skip=true",
    "-Dmaven.javadoc.skip=true",
    "-Dcheckstyle.skip=true",
    "-Denforcer.skip=true",
    "-Drat.skip=true",
    "-Dpmd.skip=true",
    "-Dspotbugs.skip=true",
    "-Dfindbugs.skip=true",
    "-Danimal.sniffer.skip=true",
    "-fn",
    "-B",
    "-U",
];

/// Maven invocations issued during a tier-3 build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MavenGoal {
    /// install -N (aggregator pom in the build root)
    InstallAggregator,

    /// install -N -f <pom>
    InstallParentOnly(PathBuf),

    /// install -f <pom>
    InstallPom(PathBuf),

    /// install -pl <module> -am
    InstallModule(String),

    /// install (whole project)
    InstallAll,

    /// compile (whole project)
    Compile,

    /// dependency:build-classpath -f <pom>
    BuildClasspath(PathBuf),
}

impl MavenGoal {
    /// Get the goal name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            MavenGoal::InstallAggregator => "install_aggregator",
            MavenGoal::InstallParentOnly(_) => "install_parent",
            MavenGoal::InstallPom(_) => "install_pom",
            MavenGoal::InstallModule(_) => "install_module",
            MavenGoal::InstallAll => "install_all",
            MavenGoal::Compile => "compile",
            MavenGoal::BuildClasspath(_) => "build_classpath",
        }
    }

    /// Arguments passed to `mvn`.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = match self {
            MavenGoal::InstallAggregator => vec!["install".into(), "-N".into()],
            MavenGoal::InstallParentOnly(pom) => vec![
                "install".into(),
                "-N".into(),
                "-f".into(),
                pom.display().to_string(),
            ],
            MavenGoal::InstallPom(pom) => {
                vec!["install".into(), "-f".into(), pom.display().to_string()]
            }
            MavenGoal::InstallModule(module) => vec![
                "install".into(),
                "-pl".into(),
                module.clone(),
                "-am".into(),
            ],
            MavenGoal::InstallAll => vec!["install".into()],
            MavenGoal::Compile => vec!["compile".into()],
            MavenGoal::BuildClasspath(pom) => {
                return vec![
                    "dependency:build-classpath".into(),
                    "-DincludeScope=compile".into(),
                    "-Dmdep.outputFile=/dev/stdout".into(),
                    "-q".into(),
                    "-f".into(),
                    pom.display().to_string(),
                    "-B".into(),
                ];
            }
        };
        args.extend(SKIP_FLAGS.iter().map(|f| f.to_string()));
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_names() {
        assert_eq!(MavenGoal::Compile.name(), "compile");
        assert_eq!(MavenGoal::InstallModule("core".into()).name(), "install_module");
    }

    #[test]
    fn test_build_goals_carry_skip_flags() {
        let args = MavenGoal::InstallModule("services/api".into()).args();
        assert_eq!(&args[..4], &["install", "-pl", "services/api", "-am"]);
        for flag in SKIP_FLAGS {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
        assert_eq!(args.last().map(String::as_str), Some("-U"));
    }

    #[test]
    fn test_parent_only_install() {
        let args = MavenGoal::InstallParentOnly(PathBuf::from("/w/tooling/pom.xml")).args();
        assert_eq!(&args[..4], &["install", "-N", "-f", "/w/tooling/pom.xml"]);
    }

    #[test]
    fn test_classpath_goal_has_no_skip_flags() {
        let args = MavenGoal::BuildClasspath(PathBuf::from("/w/core/pom.xml")).args();
        assert_eq!(args[0], "dependency:build-classpath");
        assert!(args.contains(&"-Dmdep.outputFile=/dev/stdout".to_string()));
        assert!(!args.contains(&"-DskipTests".to_string()));
    }
}
