use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dqa");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();

    // Paged text fixtures: form feed separates pages.
    fs::write(
        docs_dir.join("alpha.txt"),
        "Alpha document introduction about Rust programming.\nIt covers cargo and crates in detail.\u{c}Second page discusses the borrow checker and lifetimes.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("beta.txt"),
        "Beta document on machine learning pipelines.\nDeep learning frameworks are compared.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("gamma.md"),
        "Gamma notes about deployment and infrastructure.\nKubernetes and Docker are mentioned here.",
    )
    .unwrap();

    // Embeddings disabled: integration tests exercise the degraded
    // lexical path deterministically, with no model downloads.
    let config_content = format!(
        r#"[db]
path = "{}/data/docqa.sqlite"

[chunking]
max_chars = 1200

[embedding]
provider = "disabled"
"#,
        root.display()
    );

    let config_path = config_dir.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_dqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = dqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_dqa(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_dqa(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_dqa(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_directory() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let docs = tmp.path().join("docs");
    let (stdout, stderr, success) = run_dqa(&config_path, &["ingest", docs.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files processed: 3"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_single_file_reports_chunks() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let alpha = tmp.path().join("docs").join("alpha.txt");
    let (stdout, _, success) = run_dqa(&config_path, &["ingest", alpha.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("alpha.txt"));
    assert!(stdout.contains("chunks written:"));
}

#[test]
fn test_ingest_missing_path_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let (_, stderr, success) = run_dqa(&config_path, &["ingest", "/nonexistent/path"]);
    assert!(!success, "Ingesting a missing path should fail");
    assert!(stderr.contains("does not exist") || stderr.contains("No ingestable"));
}

#[test]
fn test_list_shows_per_source_stats() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let docs = tmp.path().join("docs");
    run_dqa(&config_path, &["ingest", docs.to_str().unwrap()]);

    let (stdout, _, success) = run_dqa(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("alpha.txt"));
    assert!(stdout.contains("beta.txt"));
    assert!(stdout.contains("gamma.md"));
    assert!(stdout.contains("documents: 3"));
    // alpha.txt has two pages
    assert!(stdout.contains("1-2"));
}

#[test]
fn test_search_lexical_mode_notes_degradation() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let docs = tmp.path().join("docs");
    run_dqa(&config_path, &["ingest", docs.to_str().unwrap()]);

    let (stdout, _, success) = run_dqa(&config_path, &["search", "Rust programming"]);
    assert!(success, "search failed");
    assert!(stdout.contains("lexical mode"));
    assert!(stdout.contains("alpha.txt"));
    assert!(stdout.contains("[0.0000]"));
}

#[test]
fn test_search_scoped_to_source() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let docs = tmp.path().join("docs");
    run_dqa(&config_path, &["ingest", docs.to_str().unwrap()]);

    let (stdout, _, success) = run_dqa(
        &config_path,
        &["search", "document", "--source", "beta.txt"],
    );
    assert!(success);
    assert!(stdout.contains("beta.txt"));
    assert!(!stdout.contains("alpha.txt"));
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let (stdout, _, success) = run_dqa(&config_path, &["search", ""]);
    assert!(success, "Empty query should not panic");
    assert!(stdout.contains("No results"));
}

#[test]
fn test_search_no_results() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let docs = tmp.path().join("docs");
    run_dqa(&config_path, &["ingest", docs.to_str().unwrap()]);

    let (stdout, _, success) = run_dqa(&config_path, &["search", "xyznonexistent"]);
    assert!(success);
    assert!(stdout.contains("No results"));
}

#[test]
fn test_search_hostile_query_does_not_error() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let docs = tmp.path().join("docs");
    run_dqa(&config_path, &["ingest", docs.to_str().unwrap()]);

    let (_, stderr, success) = run_dqa(&config_path, &["search", "\"AND ( OR *"]);
    assert!(success, "FTS metacharacters must not fail: {}", stderr);
}

#[test]
fn test_technical_page_produces_technical_chunk() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);

    let paper = tmp.path().join("docs").join("paper.txt");
    fs::write(
        &paper,
        "General introduction to the studied estimator.\u{c}Theorem 1: the estimator is consistent as n grows without bound.\nDiscussion of the proof technique follows.",
    )
    .unwrap();
    run_dqa(&config_path, &["ingest", paper.to_str().unwrap()]);

    // The theorem chunk must exist, be scoped to page 2, and start the
    // technical passage at the statement.
    let (stdout, _, success) = run_dqa(
        &config_path,
        &["search", "estimator consistent", "--source", "paper.txt"],
    );
    assert!(success);
    assert!(stdout.contains("Theorem 1"));
    assert!(stdout.contains("page 2"));
}

#[test]
fn test_reingest_replaces_previous_version() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let alpha = tmp.path().join("docs").join("alpha.txt");
    run_dqa(&config_path, &["ingest", alpha.to_str().unwrap()]);

    fs::write(&alpha, "Rewritten alpha content, single page now.").unwrap();
    run_dqa(&config_path, &["ingest", alpha.to_str().unwrap()]);

    let (stdout, _, _) = run_dqa(&config_path, &["list"]);
    assert!(stdout.contains("documents: 1"));
    assert!(stdout.contains("1-1"));

    let (old_hits, _, _) = run_dqa(&config_path, &["search", "borrow checker"]);
    assert!(old_hits.contains("No results"));
}

#[test]
fn test_remove_source_and_idempotence() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let docs = tmp.path().join("docs");
    run_dqa(&config_path, &["ingest", docs.to_str().unwrap()]);

    let (stdout, _, success) = run_dqa(&config_path, &["remove", "alpha.txt"]);
    assert!(success);
    assert!(stdout.contains("Removed alpha.txt"));

    let (stdout2, _, success2) = run_dqa(&config_path, &["remove", "alpha.txt"]);
    assert!(success2, "Removing an absent source is not an error");
    assert!(stdout2.contains("Nothing indexed"));

    let (search_out, _, _) = run_dqa(&config_path, &["search", "Rust", "--source", "alpha.txt"]);
    assert!(search_out.contains("No results"));
}

#[test]
fn test_ask_without_api_key_reports_cause() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let docs = tmp.path().join("docs");
    run_dqa(&config_path, &["ingest", docs.to_str().unwrap()]);

    let binary = dqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(["ask", "What is covered?"])
        .env_remove("GROQ_API_KEY")
        .output()
        .unwrap();
    assert!(!output.status.success(), "ask without API key should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("GROQ_API_KEY"),
        "Should name the missing variable, got: {}",
        stderr
    );
}

#[test]
fn test_summarize_without_api_key_reports_cause() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let docs = tmp.path().join("docs");
    run_dqa(&config_path, &["ingest", docs.to_str().unwrap()]);

    let binary = dqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(["summarize", "alpha.txt"])
        .env_remove("GROQ_API_KEY")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GROQ_API_KEY"));
}

#[test]
fn test_missing_config_fails() {
    let (_tmp, _config_path) = setup_test_env();

    let binary = dqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg("/nonexistent/docqa.toml")
        .arg("list")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config"));
}
