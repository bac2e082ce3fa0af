//! Integration tests for the HTTP fetcher and retry controller
//!
//! These tests use wiremock to stand in for the remote API.

use serde_json::json;
use slug_harvester::config::UserAgentConfig;
use slug_harvester::crawler::{
    build_http_client, fetch_with_retry, FetchError, FetchOutcome, HttpFetcher, RecordSource,
    RetryPolicy,
};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestHarvester".to_string(),
        crawler_version: "1.0".to_string(),
        contact_email: None,
    }
}

fn fetcher_with_timeout(server: &MockServer, timeout: Duration) -> HttpFetcher {
    let client = build_http_client(&user_agent(), timeout).unwrap();
    HttpFetcher::new(client, Url::parse(&server.uri()).unwrap(), Duration::ZERO)
}

fn fetcher(server: &MockServer) -> HttpFetcher {
    fetcher_with_timeout(server, Duration::from_secs(5))
}

fn no_wait(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn test_primary_fetch_returns_body() {
    let server = MockServer::start().await;
    let body = json!({"data": {"id": "a1", "dateOfBirth": "1990-06-15T00:00:00Z"}});

    Mock::given(method("GET"))
        .and(path("/home/alice"))
        .and(header("user-agent", "TestHarvester/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = fetcher(&server).fetch_primary("alice").await.unwrap();
    assert_eq!(fetched, body);
}

#[tokio::test]
async fn test_primary_fetch_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home/alice"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = fetcher(&server).fetch_primary("alice").await;
    assert!(matches!(result, Err(FetchError::Status { status: 500, .. })));
}

#[tokio::test]
async fn test_primary_fetch_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = fetcher(&server).fetch_primary("alice").await;
    assert!(matches!(result, Err(FetchError::Body { .. })));
}

#[tokio::test]
async fn test_primary_fetch_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {}}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let result = fetcher_with_timeout(&server, Duration::from_millis(200))
        .fetch_primary("slow")
        .await;
    assert!(matches!(result, Err(FetchError::Timeout { .. })));
}

#[tokio::test]
async fn test_auxiliary_fetch_returns_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home/services/a1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"title": "Massage"}, {"title": "Yoga"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let services = fetcher(&server).fetch_auxiliary("a1").await;
    assert_eq!(services, vec![json!({"title": "Massage"}), json!({"title": "Yoga"})]);
}

#[tokio::test]
async fn test_auxiliary_fetch_failures_yield_empty_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home/services/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/home/services/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/home/services/wrong-shape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"title": "x"}})))
        .mount(&server)
        .await;

    let fetcher = fetcher(&server);
    assert!(fetcher.fetch_auxiliary("broken").await.is_empty());
    assert!(fetcher.fetch_auxiliary("garbled").await.is_empty());
    assert!(fetcher.fetch_auxiliary("wrong-shape").await.is_empty());
    // No mock at all: 404
    assert!(fetcher.fetch_auxiliary("missing").await.is_empty());
}

#[tokio::test]
async fn test_retry_makes_exactly_three_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home/bob"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let outcome = fetch_with_retry(&fetcher(&server), "bob", &no_wait(3)).await;

    match outcome {
        FetchOutcome::Exhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last_error, FetchError::Status { status: 503, .. }));
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retry_success_embeds_services() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "a1", "dateOfBirth": "1990-06-15T00:00:00Z", "name": "Alice"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/home/services/a1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"title": "Massage"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = fetch_with_retry(&fetcher(&server), "alice", &no_wait(3)).await;

    match outcome {
        FetchOutcome::Success { record, attempts } => {
            assert_eq!(attempts, 1);
            assert_eq!(record.id, "a1");
            assert_eq!(record.slug, "alice");
            assert_eq!(record.services, vec![json!({"title": "Massage"})]);
            assert_eq!(record.fields.get("name"), Some(&json!("Alice")));
        }
        other => panic!("expected Success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_shape_error_is_fetched_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home/carol"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "c3"}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/home/services/c3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = fetch_with_retry(&fetcher(&server), "carol", &no_wait(3)).await;
    assert!(matches!(outcome, FetchOutcome::PermanentFailure { .. }));
}
