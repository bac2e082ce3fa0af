//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end, against both storage backends.

use serde_json::{json, Value};
use slug_harvester::config::{parse_config, Config};
use slug_harvester::crawler::run_crawl;
use slug_harvester::output::load_statistics;
use slug_harvester::storage::{
    FileStorage, OutputStore, ProgressStore, RunStatus, SqliteStorage,
};
use slug_harvester::{HarvestError, ProgressState};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration for the given mock server and storage section
fn create_test_config(server: &MockServer, candidates: &Path, storage: &str) -> Config {
    let toml = format!(
        r#"
[crawler]
max-attempts = 3
retry-delay-ms = 0
politeness-min-ms = 0
politeness-max-ms = 5
auxiliary-delay-ms = 0
checkpoint-interval = 2
request-timeout-secs = 5

[api]
base-url = "{}"

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"

[input]
candidates-path = "{}"

[storage]
{}
"#,
        server.uri(),
        candidates.display(),
        storage
    );
    parse_config(&toml).unwrap()
}

fn sqlite_section(dir: &TempDir, run_key: &str) -> String {
    format!(
        "backend = \"sqlite\"\nrun-key = \"{}\"\ndatabase-path = \"{}\"",
        run_key,
        dir.path().join("harvest.db").display()
    )
}

fn file_section(dir: &TempDir) -> String {
    format!(
        "backend = \"file\"\nstate-path = \"{}\"\noutput-path = \"{}\"",
        dir.path().join("scrape_state.json").display(),
        dir.path().join("scraped_data.jsonl").display()
    )
}

fn write_candidates(dir: &TempDir, entries: Value) -> std::path::PathBuf {
    let path = dir.path().join("candidates.json");
    std::fs::write(&path, serde_json::to_vec(&entries).unwrap()).unwrap();
    path
}

/// Mounts alice (good record), bob (always 500) and carol (no birth date)
async fn mount_api(server: &MockServer, alice_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/home/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "a1",
                "dateOfBirth": "1990-06-15T00:00:00Z",
                "displayName": "Alice"
            }
        })))
        .expect(alice_calls)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/home/services/a1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"title": "Massage"}]})),
        )
        .expect(alice_calls)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/home/bob"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/home/carol"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "c3"}})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_sqlite_backend() {
    let server = MockServer::start().await;
    mount_api(&server, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(
        &dir,
        json!([
            {"username": "alice", "name": "Alice"},
            {"username": "bob"},
            {"username": "carol"},
            {"username": "alice"}
        ]),
    );
    let config = create_test_config(&server, &candidates, &sqlite_section(&dir, "main_scraper"));

    let report = run_crawl(config).await.unwrap();

    assert!(!report.interrupted);
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 2);
    assert_eq!(report.remaining, 0);

    let storage = SqliteStorage::new(&dir.path().join("harvest.db")).unwrap();
    let record = storage.get("alice").unwrap().unwrap();
    assert_eq!(record.id, "a1");
    assert_eq!(record.services, vec![json!({"title": "Massage"})]);
    assert_eq!(record.fields.get("displayName"), Some(&json!("Alice")));
    assert!(record.age >= 33);

    let stats = load_statistics(&storage, "main_scraper").unwrap();
    assert_eq!(stats.status, Some(RunStatus::Completed));
    assert_eq!(stats.failed_ids, vec!["bob".to_string(), "carol".to_string()]);
    assert_eq!(stats.stored_records, 1);
}

#[tokio::test]
async fn test_rerun_fetches_nothing_new() {
    let server = MockServer::start().await;
    // Across both runs alice is fetched once, bob three times, carol once
    mount_api(&server, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(&dir, json!(["alice", "bob", "carol"]));

    let first = create_test_config(&server, &candidates, &sqlite_section(&dir, "main_scraper"));
    run_crawl(first).await.unwrap();

    // Same run key: nothing remains, so nothing is requested
    let again = create_test_config(&server, &candidates, &sqlite_section(&dir, "main_scraper"));
    let report = run_crawl(again).await.unwrap();
    assert_eq!(report.handled, 0);

    // New run key over the same records: alice is skipped as already stored
    let retry_failed = write_candidates(&dir, json!(["alice"]));
    let other = create_test_config(&server, &retry_failed, &sqlite_section(&dir, "second_pass"));
    let report = run_crawl(other).await.unwrap();
    assert_eq!(report.handled, 1);
    assert_eq!(report.processed, 1);

    let storage = SqliteStorage::new(&dir.path().join("harvest.db")).unwrap();
    assert_eq!(storage.count().unwrap(), 1);
}

#[tokio::test]
async fn test_full_crawl_file_backend() {
    let server = MockServer::start().await;
    mount_api(&server, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(&dir, json!(["alice", "bob", "carol"]));
    let config = create_test_config(&server, &candidates, &file_section(&dir));

    let report = run_crawl(config).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 2);

    let state: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("scrape_state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        state["main_scraper"],
        json!({
            "status": "completed",
            "processed": ["alice"],
            "remaining": [],
            "failed": ["bob", "carol"]
        })
    );

    let lines: Vec<Value> = std::fs::read_to_string(dir.path().join("scraped_data.jsonl"))
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["id"], json!("a1"));
    assert_eq!(lines[0]["slug"], json!("alice"));
    assert_eq!(lines[0]["services"], json!([{"title": "Massage"}]));
}

#[tokio::test]
async fn test_resume_from_saved_file_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/home/dave"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": 44, "dateOfBirth": "1970-01-01"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("scrape_state.json");
    let output_path = dir.path().join("scraped_data.jsonl");

    // A previous run was killed with dave still queued
    {
        let mut storage = FileStorage::open(&state_path, &output_path).unwrap();
        let state = ProgressState::from_parts(
            vec!["alice".to_string()],
            vec!["dave".to_string()],
            vec!["bob".to_string()],
        )
        .unwrap();
        storage.save("main_scraper", &state).unwrap();
        storage
            .set_run_status("main_scraper", RunStatus::Interrupted)
            .unwrap();
    }

    // The candidates file is not consulted when progress exists
    let candidates = dir.path().join("missing.json");
    let config = create_test_config(&server, &candidates, &file_section(&dir));

    let report = run_crawl(config).await.unwrap();
    assert_eq!(report.handled, 1);
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);

    let storage = FileStorage::open(&state_path, &output_path).unwrap();
    assert_eq!(storage.get("dave").unwrap().unwrap().id, "44");

    // A numeric remote id is written back as a number
    let line = std::fs::read_to_string(&output_path).unwrap();
    let stored: Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(stored["id"], json!(44));
    assert_eq!(
        storage.run_status("main_scraper").unwrap(),
        Some(RunStatus::Completed)
    );
}

#[tokio::test]
async fn test_empty_candidates_is_fatal() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(&dir, json!([]));
    let config = create_test_config(&server, &candidates, &sqlite_section(&dir, "main_scraper"));

    let result = run_crawl(config).await;
    assert!(matches!(result, Err(HarvestError::NoCandidates { .. })));
}
