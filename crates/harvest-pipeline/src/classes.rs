//! Selection of the classes handed to a generator.

use harvest_core::paths::class_name_from_source;
use harvest_core::Commit;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// FQCNs of the commit's changed production sources, in dataset order.
pub fn target_classes(commit: &Commit) -> Vec<String> {
    let mut seen = BTreeSet::new();
    commit
        .files
        .iter()
        .filter_map(|f| class_name_from_source(&f.file_name))
        .filter(|fqcn| seen.insert(fqcn.clone()))
        .collect()
}

/// Top-level, non-test classes compiled into `dirs`, sorted.
pub fn collect_compiled_classes(dirs: &[PathBuf]) -> Vec<String> {
    let mut classes = BTreeSet::new();
    for dir in dirs {
        for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(fqcn) = class_name(dir, entry.path()) {
                if !fqcn.contains('$') && !fqcn.contains("Test") {
                    classes.insert(fqcn);
                }
            }
        }
    }
    classes.into_iter().collect()
}

fn class_name(root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?;
    let rel = rel.to_str()?.strip_suffix(".class")?;
    Some(rel.replace(std::path::MAIN_SEPARATOR, "."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_classes_from_changed_sources() {
        let commit = Commit::new("p", "abc")
            .with_file("core/src/main/java/org/p/Engine.java")
            .with_file("core/src/test/java/org/p/EngineTest.java")
            .with_file("core/src/main/java/org/p/Engine.java")
            .with_file("README.md");
        assert_eq!(target_classes(&commit), vec!["org.p.Engine"]);
    }

    #[test]
    fn test_compiled_classes_skip_inner_and_tests() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("target/classes");
        let pkg = classes.join("org/p");
        std::fs::create_dir_all(&pkg).unwrap();
        for name in ["Engine.class", "Engine$1.class", "EngineTestUtil.class", "Gear.class", "notes.txt"] {
            std::fs::write(pkg.join(name), b"").unwrap();
        }
        assert_eq!(
            collect_compiled_classes(&[classes]),
            vec!["org.p.Engine", "org.p.Gear"]
        );
    }
}
