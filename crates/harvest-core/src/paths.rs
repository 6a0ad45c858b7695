//! Path heuristics over repository-relative paths.
//!
//! Everything here is a pure text function over `/`-separated paths as they
//! appear in the dataset and in `git ls-tree` output.

const MAIN_JAVA: &str = "/src/main/java/";
const TEST_JAVA: &str = "/src/test/java/";
const MAIN_DIR: &str = "/src/main/";
const TEST_DIR: &str = "/src/test/";

/// Candidate suffixes appended to the stripped source path, in lookup order.
const TEST_SUFFIXES: [&str; 4] = ["Test.java", "Tests.java", "IT.java", "TestCase.java"];

/// Markers that delimit a Maven module prefix, in priority order.
const MODULE_MARKERS: [&str; 3] = ["src/main/java", "src/test/java", "src/main/resources"];

/// Marker for production sources when mapping paths to class names.
const SOURCE_ROOT: &str = "src/main/java/";

/// Final path component.
pub fn base_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Final path component without its extension.
pub fn file_stem(path: &str) -> &str {
    let base = base_name(path);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    }
}

/// Whether `path` looks like a Java test source.
pub fn is_test_file(path: &str) -> bool {
    if path.contains(TEST_DIR) {
        return true;
    }
    let base = base_name(path);
    base.ends_with("Test.java")
        || base.ends_with("Tests.java")
        || base.ends_with("IT.java")
        || (base.starts_with("Test") && base.ends_with(".java"))
}

fn main_to_test(path: &str) -> Option<String> {
    if path.contains(MAIN_JAVA) {
        Some(path.replace(MAIN_JAVA, TEST_JAVA))
    } else if path.contains(MAIN_DIR) {
        Some(path.replace(MAIN_DIR, TEST_DIR))
    } else {
        None
    }
}

/// Candidate test paths for a production source file, in lookup order.
///
/// `mod/src/main/java/org/x/Foo.java` yields `FooTest`, `FooTests`, `FooIT`,
/// `FooTestCase` and `TestFoo` under `mod/src/test/java/org/x/`. Paths outside
/// a `/src/main/` tree yield nothing.
pub fn test_candidates(source: &str) -> Vec<String> {
    if !source.ends_with(".java") {
        return Vec::new();
    }
    let Some(test_path) = main_to_test(source) else {
        return Vec::new();
    };
    let stem = &test_path[..test_path.len() - ".java".len()];

    let mut candidates: Vec<String> = TEST_SUFFIXES
        .iter()
        .map(|suffix| format!("{stem}{suffix}"))
        .collect();
    if let Some((dir, base)) = stem.rsplit_once('/') {
        candidates.push(format!("{dir}/Test{base}.java"));
    }
    candidates
}

/// Test directory (with trailing `/`) mirroring a production source's directory.
pub fn test_dir_prefix(source: &str) -> Option<String> {
    let test_path = main_to_test(source)?;
    let idx = test_path.rfind('/')?;
    Some(test_path[..=idx].to_string())
}

/// Module prefix of a single path, if it sits under a module marker.
pub fn module_root(path: &str) -> Option<&str> {
    for marker in MODULE_MARKERS {
        // a marker at the repository root does not name a module
        match path.find(marker) {
            Some(idx) if idx > 0 => {
                let module = path[..idx].trim_end_matches('/');
                return (!module.is_empty()).then_some(module);
            }
            _ => continue,
        }
    }
    None
}

/// Shortest module prefix across `paths`, ties broken lexicographically.
pub fn target_module<'a>(paths: impl IntoIterator<Item = &'a str>) -> Option<String> {
    paths
        .into_iter()
        .filter_map(module_root)
        .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .map(str::to_string)
}

/// Fully qualified class name for a production `.java` path.
pub fn class_name_from_source(path: &str) -> Option<String> {
    if !path.ends_with(".java") {
        return None;
    }
    let idx = path.find(SOURCE_ROOT)?;
    let rel = &path[idx + SOURCE_ROOT.len()..path.len() - ".java".len()];
    if rel.is_empty() {
        return None;
    }
    Some(rel.replace('/', "."))
}
