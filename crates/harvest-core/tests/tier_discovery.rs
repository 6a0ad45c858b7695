//! Integration tests for the history-mining tiers over in-memory fakes.

use harvest_core::dataset::read_dataset;
use harvest_core::fakes::MemoryVcs;
use harvest_core::reporting::{
    load_commit_list, read_json_artifact, write_tier1_artifacts, write_tier2_artifacts,
    COMMITS_WITHOUT_TESTS_FILE, DOUBLECHECK_RESULTS_FILE, EXTRACTED_TESTS_FILE, TIER1_DIR,
    TIER2_DIR,
};
use harvest_core::{
    ExtractedTest, HistoricalTestLocator, RepoConfig, RepositoryCache, TestConvention,
    TreeSearchFallback,
};
use std::io::Write;
use std::sync::Arc;

const SHA_A: &str = "aaaaaaaa11111111";
const SHA_B: &str = "bbbbbbbb22222222";
const SHA_C: &str = "cccccccc33333333";

fn seeded_vcs() -> Arc<MemoryVcs> {
    let vcs = Arc::new(MemoryVcs::new());
    // A: conventional test next to the source
    vcs.add_file(
        SHA_A,
        "lang/src/test/java/org/l/TokenizerTest.java",
        "package org.l;\npublic class TokenizerTest {\n  @Test\n  public void splits() { assertEquals(2, split(\"a b\").length); }\n  @Test\n  public void splits() { fail(); }\n}\n",
    );
    // B: only an unconventionally named test in the same package
    vcs.add_file(
        SHA_B,
        "lang/src/test/java/org/l/LexingScenarios.java",
        "package org.l;\npublic class LexingScenarios extends TestCase {\n  public void testEmpty() { assertTrue(lex(\"\").isEmpty()); }\n}\n",
    );
    // C: nothing at all
    vcs.add_revision(SHA_C);
    vcs
}

fn dataset_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for (sha, path) in [
        (SHA_A, "lang/src/main/java/org/l/Tokenizer.java"),
        (SHA_B, "lang/src/main/java/org/l/Lexer.java"),
        (SHA_C, "lang/src/main/java/org/l/Parser.java"),
    ] {
        writeln!(
            file,
            r#"{{"project":"lang","commit_sha":"{sha}","files":[{{"file_name":"{path}","before":"class X {{}}"}}]}}"#
        )
        .unwrap();
    }
    writeln!(file, "{{ broken").unwrap();
    file
}

/// Test: tier 1 then tier 2 restarted from tier 1's persisted output
#[tokio::test]
async fn test_tier2_restarts_from_persisted_tier1_output() {
    let out = tempfile::tempdir().unwrap();
    let repos = tempfile::tempdir().unwrap();
    let vcs = seeded_vcs();
    let config = RepoConfig {
        repos_dir: repos.path().to_path_buf(),
        ..Default::default()
    };

    let dataset = read_dataset(dataset_file().path(), None).unwrap();
    assert_eq!(dataset.malformed_lines, 1);

    let tier1_dir = out.path().join(TIER1_DIR);
    {
        let mut cache = RepositoryCache::new(config.clone(), vcs.clone());
        let report = HistoricalTestLocator::new(&mut cache)
            .process_dataset(&dataset)
            .await;
        assert_eq!(report.stats.test_methods_extracted, 1, "duplicate name kept once");
        assert_eq!(report.stats.malformed_lines, 1);
        write_tier1_artifacts(&tier1_dir, &report).unwrap();
    }

    let tests: Vec<ExtractedTest> = read_json_artifact(&tier1_dir.join(EXTRACTED_TESTS_FILE)).unwrap();
    assert_eq!(tests.len(), 1);
    assert!(tests[0].code.contains("split(\"a b\")"));

    // fresh process: new cache, input only from disk
    let pending = load_commit_list(&tier1_dir.join(COMMITS_WITHOUT_TESTS_FILE)).unwrap();
    let pending_shas: Vec<_> = pending.iter().map(|c| c.commit_sha.as_str()).collect();
    assert_eq!(pending_shas, vec![SHA_B, SHA_C]);

    let mut cache = RepositoryCache::new(config, vcs.clone());
    let tier2 = TreeSearchFallback::new(&mut cache).check_commits(&pending).await;
    assert_eq!(tier2.stats.checked, 2);
    assert_eq!(tier2.stats.recovered, 1);
    assert_eq!(tier2.tests[0].method_name, "testEmpty");
    assert_eq!(tier2.tests[0].annotation, TestConvention::Legacy);

    let tier2_dir = out.path().join(TIER2_DIR);
    write_tier2_artifacts(&tier2_dir, &tier2).unwrap();
    let results: serde_json::Value =
        read_json_artifact(&tier2_dir.join(DOUBLECHECK_RESULTS_FILE)).unwrap();
    assert_eq!(results["stats"]["recovered"], 1);
    assert_eq!(results["tests"][0]["tier"], "tier2");
    let remaining = load_commit_list(&tier2_dir.join(COMMITS_WITHOUT_TESTS_FILE)).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].commit_sha, SHA_C);
}

/// Test: a commit that tier 1 served is never handed to tier 2
#[tokio::test]
async fn test_served_commits_do_not_reach_tier2() {
    let repos = tempfile::tempdir().unwrap();
    let vcs = seeded_vcs();
    let mut cache = RepositoryCache::new(
        RepoConfig {
            repos_dir: repos.path().to_path_buf(),
            ..Default::default()
        },
        vcs,
    );
    let dataset = read_dataset(dataset_file().path(), Some(1)).unwrap();
    let report = HistoricalTestLocator::new(&mut cache)
        .process_dataset(&dataset)
        .await;
    assert!(report.commits_without_tests.is_empty());

    let tier2 = TreeSearchFallback::new(&mut cache)
        .check_commits(&report.commits_without_tests)
        .await;
    assert_eq!(tier2.stats.checked, 0);
}
