//! Black-box CLI tests driving the `sqlforge` binary end-to-end (spec.md §6.1,
//! C7 Test harness). Grounded in the corpus's `assert_cmd`/`tempfile` style
//! (e.g. `quarylabs-sqruff/crates/cli/tests/baseline.rs`).

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const SCHEMA: &str = r#"
CREATE TABLE authors (
    id BIGSERIAL PRIMARY KEY,
    first_name text NOT NULL,
    last_name text NOT NULL,
    alias text NOT NULL,
    bio text
);
"#;

const QUERIES: &str = r#"
query GetAuthorById(id: string!) {
    SELECT id FROM authors WHERE id = {id} LIMIT 1
}
"#;

fn write_project(dir: &TempDir, queries: &str) -> std::path::PathBuf {
    let schema_path = dir.path().join("schema.sql");
    let query_path = dir.path().join("queries.sql");
    let output_path = dir.path().join("generated.rs");
    let config_path = dir.path().join("sqlforge.conf");

    std::fs::write(&schema_path, SCHEMA).unwrap();
    std::fs::write(&query_path, queries).unwrap();
    std::fs::write(
        &config_path,
        format!(
            r#"
            schema_path = "{}";
            query_path = "{}";
            output_path = "{}";
            output_package = "db";
            "#,
            schema_path.display(),
            query_path.display(),
            output_path.display(),
        ),
    )
    .unwrap();

    config_path
}

#[test]
fn compiles_a_simple_query_to_an_output_file() {
    let dir = TempDir::new().unwrap();
    let config_path = write_project(&dir, QUERIES);
    let output_path = dir.path().join("generated.rs");

    Command::cargo_bin("sqlforge")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap()])
        .assert()
        .success();

    let generated = std::fs::read_to_string(&output_path).unwrap();
    assert!(generated.contains("pub mod db {"));
    assert!(generated.contains("pub fn query_GetAuthorById"));
    assert!(generated.contains("pub struct GetAuthorByIdInput"));
}

#[test]
fn check_flag_skips_output_but_still_reports_success() {
    let dir = TempDir::new().unwrap();
    let config_path = write_project(&dir, QUERIES);
    let output_path = dir.path().join("generated.rs");

    Command::cargo_bin("sqlforge")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "--check"])
        .assert()
        .success();

    assert!(!output_path.exists());
}

#[test]
fn check_errors_are_reported_and_no_output_is_written() {
    let dir = TempDir::new().unwrap();
    let bad_queries = "query Bad { SELECT id FROM nonexistent_table }";
    let config_path = write_project(&dir, bad_queries);
    let output_path = dir.path().join("generated.rs");

    Command::cargo_bin("sqlforge")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("unknown table"));

    assert!(!output_path.exists());
}

#[test]
fn dump_ast_json_prints_checked_query_names() {
    let dir = TempDir::new().unwrap();
    let config_path = write_project(&dir, QUERIES);

    Command::cargo_bin("sqlforge")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "--dump-ast", "json", "--check"])
        .assert()
        .success()
        .stdout(contains("GetAuthorById"));
}

#[test]
fn missing_config_key_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("sqlforge.conf");
    std::fs::write(&config_path, r#"schema_path = "schema.sql";"#).unwrap();

    Command::cargo_bin("sqlforge")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn quiet_suppresses_the_checked_ok_status_line() {
    let dir = TempDir::new().unwrap();
    let config_path = write_project(&dir, QUERIES);

    Command::cargo_bin("sqlforge")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "--check", "--quiet"])
        .assert()
        .success()
        .stderr(contains("checked OK").not());
}
