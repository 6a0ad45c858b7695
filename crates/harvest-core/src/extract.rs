//! Regex-based test method recognizer for Java sources.
//!
//! This is a best-effort heuristic over raw text, not a parser. Braces inside
//! string literals and comments are counted like any other brace, and a
//! method whose body never balances is dropped.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use crate::domain::{CommitKey, ExtractedTest, TestConvention, Tier};
use crate::paths;

lazy_static! {
    /// `@Test` line, optional modifiers, return type, name, params, throws, `{`.
    static ref ANNOTATED_TEST: Regex = Regex::new(
        r"(@Test[^\n]*\n\s*)(?:public|protected|private)?\s*(?:static\s+)?\w[\w<>,\s]*\s+(\w+)\s*\([^)]*\)\s*(?:throws\s+[\w,\s]+)?\s*\{"
    )
    .unwrap();

    /// JUnit 3 style `public void testXxx() {`.
    static ref LEGACY_TEST: Regex = Regex::new(
        r"(?:public|protected)\s+void\s+(test\w+)\s*\([^)]*\)\s*(?:throws\s+[\w,\s]+)?\s*\{"
    )
    .unwrap();

    static ref TESTCASE_BASE: Regex =
        Regex::new(r"extends\s+(?:junit\.framework\.)?TestCase\b").unwrap();

    static ref PACKAGE_DECL: Regex = Regex::new(r"package\s+([\w.]+)\s*;").unwrap();

    static ref TYPE_DECL: Regex =
        Regex::new(r"(?:public\s+)?(?:abstract\s+)?(?:class|interface|enum)\s+(\w+)").unwrap();
}

/// A recognized test method before it is bound to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestMethod {
    pub method_name: String,
    pub code: String,
    pub convention: TestConvention,
}

/// Index of the brace closing the one at `open`, by depth counting.
pub fn matching_brace(content: &str, open: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 1usize;
    for (offset, b) in bytes[open + 1..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + 1 + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract test methods from a Java source, annotated methods first.
///
/// A method name is taken at most once per file; the first occurrence wins
/// even if its body turns out unbalanced or empty.
pub fn extract_test_methods(content: &str) -> Vec<TestMethod> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut methods = Vec::new();

    for caps in ANNOTATED_TEST.captures_iter(content) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if let Some(method) = take_method(
            content,
            &mut seen,
            whole.start(),
            whole.end() - 1,
            name.as_str(),
            TestConvention::Annotation,
        ) {
            methods.push(method);
        }
    }

    if TESTCASE_BASE.is_match(content) {
        for caps in LEGACY_TEST.captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if let Some(method) = take_method(
                content,
                &mut seen,
                whole.start(),
                whole.end() - 1,
                name.as_str(),
                TestConvention::Legacy,
            ) {
                methods.push(method);
            }
        }
    }

    methods
}

fn take_method<'c>(
    content: &'c str,
    seen: &mut HashSet<&'c str>,
    start: usize,
    open: usize,
    name: &'c str,
    convention: TestConvention,
) -> Option<TestMethod> {
    if !seen.insert(name) {
        return None;
    }
    let close = matching_brace(content, open)?;
    if close == open + 1 {
        tracing::trace!(method = %name, "skipping empty test body");
        return None;
    }
    Some(TestMethod {
        method_name: name.to_string(),
        code: content[start..=close].to_string(),
        convention,
    })
}

/// First `package` declaration.
pub fn extract_package(content: &str) -> Option<String> {
    PACKAGE_DECL
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// First class/interface/enum name, falling back to the file stem.
pub fn extract_class_name(content: &str, file_path: &str) -> String {
    TYPE_DECL
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| paths::file_stem(file_path).to_string())
}

/// Recognize every test in `content` and bind it to the commit it was
/// harvested for.
pub fn harvest_file(key: &CommitKey, file_path: &str, content: &str, tier: Tier) -> Vec<ExtractedTest> {
    let methods = extract_test_methods(content);
    if methods.is_empty() {
        return Vec::new();
    }

    let package = extract_package(content);
    let class_name = extract_class_name(content, file_path);
    let fqcn = match &package {
        Some(pkg) => format!("{pkg}.{class_name}"),
        None => class_name.clone(),
    };

    methods
        .into_iter()
        .map(|m| ExtractedTest {
            test_id: ExtractedTest::compute_id(key, &fqcn, &m.method_name),
            project: key.project.clone(),
            commit_sha: key.commit_sha.clone(),
            method_name: m.method_name,
            code: m.code,
            file_path: file_path.to_string(),
            annotation: m.convention,
            package: package.clone(),
            class_name: class_name.clone(),
            fqcn: fqcn.clone(),
            tier,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUNIT4: &str = r#"package org.apache.commons.lang3;

import org.junit.Test;
import static org.junit.Assert.*;

public class StringUtilsTest {

    @Test
    public void testIsEmpty() {
        assertTrue(StringUtils.isEmpty(""));
        if (true) { assertFalse(StringUtils.isEmpty("x")); }
    }

    @Test(expected = IllegalArgumentException.class)
    public static void rejectsNull() throws Exception, IOException {
        StringUtils.repeat(null, -1);
    }

    @Test
    public void testIsEmpty() {
        fail("duplicate name");
    }
}
"#;

    fn key() -> CommitKey {
        CommitKey {
            project: "commons-lang".into(),
            commit_sha: "0123456789abcdef".into(),
        }
    }

    #[test]
    fn test_matching_brace_nested() {
        let src = "x { a { b } c } y";
        assert_eq!(matching_brace(src, 2), Some(14));
        assert_eq!(matching_brace(src, 6), Some(10));
        assert_eq!(matching_brace("{ {", 0), None);
        assert_eq!(matching_brace("abc", 0), None);
    }

    #[test]
    fn test_annotated_methods_first_name_wins() {
        let methods = extract_test_methods(JUNIT4);
        let names: Vec<_> = methods.iter().map(|m| m.method_name.as_str()).collect();
        assert_eq!(names, vec!["testIsEmpty", "rejectsNull"]);
        assert!(methods[0].code.starts_with("@Test"));
        assert!(methods[0].code.ends_with('}'));
        assert!(methods[0].code.contains("isEmpty(\"x\")"));
        assert!(!methods[0].code.contains("duplicate name"));
        assert!(methods
            .iter()
            .all(|m| m.convention == TestConvention::Annotation));
    }

    #[test]
    fn test_extracted_bodies_are_balanced() {
        for m in extract_test_methods(JUNIT4) {
            let opens = m.code.matches('{').count();
            let closes = m.code.matches('}').count();
            assert_eq!(opens, closes, "unbalanced body for {}", m.method_name);
        }
    }

    #[test]
    fn test_legacy_testcase() {
        let src = "public class CalcTest extends TestCase {\n    public void testAdd(){ assertEquals(1,1); }\n}\n";
        let methods = extract_test_methods(src);
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].method_name, "testAdd");
        assert_eq!(methods[0].convention, TestConvention::Legacy);
        assert_eq!(methods[0].code, "public void testAdd(){ assertEquals(1,1); }");
    }

    #[test]
    fn test_legacy_requires_testcase_base() {
        let src = "public class Calc {\n    public void testAdd(){ check(); }\n}\n";
        assert!(extract_test_methods(src).is_empty());

        let fq = "class CalcTest extends junit.framework.TestCase {\n protected void testSub() throws Exception { check(); }\n}";
        assert_eq!(extract_test_methods(fq)[0].method_name, "testSub");

        let other = "class CalcTest extends TestCaseSupport {\n public void testMul() { check(); }\n}";
        assert!(extract_test_methods(other).is_empty());
    }

    #[test]
    fn test_unbalanced_body_discarded() {
        let src = "class ATest {\n  @Test\n  public void broken() {\n    if (x) {\n";
        assert!(extract_test_methods(src).is_empty());
    }

    #[test]
    fn test_empty_body_discarded_and_name_consumed() {
        let src = "public class XTest extends TestCase {\n  @Test\n  public void testX() {}\n  public void testX() { run(); }\n  public void testY() { run(); }\n}";
        let names: Vec<_> = extract_test_methods(src)
            .into_iter()
            .map(|m| m.method_name)
            .collect();
        assert_eq!(names, vec!["testY"]);
    }

    #[test]
    fn test_generated_test_style() {
        let src = "package org.x;\n\npublic class Foo_ESTest extends Foo_ESTest_scaffolding {\n\n  @Test(timeout = 4000)\n  public void test0()  throws Throwable  {\n      Foo foo0 = new Foo();\n      assertNotNull(foo0);\n  }\n}\n";
        let tests = harvest_file(&key(), "org/x/Foo_ESTest.java", src, Tier::PrimaryGeneration);
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].method_name, "test0");
        assert_eq!(tests[0].fqcn, "org.x.Foo_ESTest");
        assert_eq!(tests[0].tier, Tier::PrimaryGeneration);
    }

    #[test]
    fn test_package_and_class_extraction() {
        assert_eq!(
            extract_package(JUNIT4).as_deref(),
            Some("org.apache.commons.lang3")
        );
        assert_eq!(extract_class_name(JUNIT4, "x/Whatever.java"), "StringUtilsTest");
        assert_eq!(extract_class_name("// nothing here", "a/b/FooTest.java"), "FooTest");
        assert_eq!(extract_package("class A {}"), None);
    }

    #[test]
    fn test_harvest_file_binds_commit() {
        let tests = harvest_file(&key(), "m/src/test/java/StringUtilsTest.java", JUNIT4, Tier::Historical);
        assert_eq!(tests.len(), 2);
        let first = &tests[0];
        assert_eq!(first.project, "commons-lang");
        assert_eq!(first.fqcn, "org.apache.commons.lang3.StringUtilsTest");
        assert_eq!(first.package.as_deref(), Some("org.apache.commons.lang3"));
        assert_eq!(first.annotation, TestConvention::Annotation);
        assert_eq!(
            first.test_id,
            ExtractedTest::compute_id(&key(), &first.fqcn, "testIsEmpty")
        );
        assert_ne!(tests[0].test_id, tests[1].test_id);
    }

    #[test]
    fn test_harvest_file_without_package() {
        let src = "class FooTest {\n @Test\n void plain() { go(); }\n}";
        let tests = harvest_file(&key(), "FooTest.java", src, Tier::TreeSearch);
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].fqcn, "FooTest");
        assert!(tests[0].package.is_none());
    }
}
