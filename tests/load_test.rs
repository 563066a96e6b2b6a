use httpmock::Method::GET;
use httpmock::MockServer;
use std::time::Duration;

mod common;

use gosling::outcome::{RequestErrorKind, CONNECTION_ERROR_STATUS};
use gosling::{LoadError, LoadTest};

// Paths used in load tests performed during these tests.
const INDEX_PATH: &str = "/";
const SLOW_PATH: &str = "/slow";

/// Every request against a healthy target succeeds.
#[tokio::test]
async fn test_all_successful() {
    let server = MockServer::start();
    let index = server.mock(|when, then| {
        when.method(GET).path(INDEX_PATH);
        then.status(200).body("ok");
    });

    let configuration =
        common::build_configuration(&server, vec!["--requests", "10", "--concurrency", "3"]);
    let report = common::run_load_test(configuration, None).await;

    common::validate_report(&report, 10);
    assert_eq!(report.concurrency(), 3);
    assert_eq!(report.success_count(), 10);
    assert_eq!(report.status_distribution().len(), 1);
    assert_eq!(report.status_distribution().get(&200), Some(&10));
    assert!(report.errors().is_empty());

    // Exactly one request per job token.
    assert_eq!(index.calls(), 10);
}

/// Non-200 responses are normal outcomes, recorded under their status code.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_error_status_codes() {
    let server = MockServer::start();
    let index = server.mock(|when, then| {
        when.method(GET).path(INDEX_PATH);
        then.status(404);
    });

    let configuration =
        common::build_configuration(&server, vec!["--requests", "25", "--concurrency", "5"]);
    let report = common::run_load_test(configuration, None).await;

    common::validate_report(&report, 25);
    assert_eq!(report.success_count(), 0);
    assert_eq!(report.status_distribution().get(&404), Some(&25));
    assert_eq!(
        report.status_distribution().get(&CONNECTION_ERROR_STATUS),
        None
    );
    assert_eq!(index.calls(), 25);
}

/// Never launch more workers than there are requests.
#[tokio::test]
async fn test_concurrency_clamped_to_requests() {
    let server = MockServer::start();
    let index = server.mock(|when, then| {
        when.method(GET).path(INDEX_PATH);
        then.status(200);
    });

    let configuration =
        common::build_configuration(&server, vec!["--requests", "2", "--concurrency", "8"]);
    let load_test = LoadTest::initialize_with_config(configuration).unwrap();
    assert_eq!(load_test.concurrency(), 2);

    let report = load_test.execute().await.unwrap();
    common::validate_report(&report, 2);
    assert_eq!(report.concurrency(), 2);
    assert_eq!(index.calls(), 2);
}

/// Requests that exceed the timeout are recorded as connection errors, and the run
/// still completes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeouts_are_connection_errors() {
    let server = MockServer::start();
    let _slow = server.mock(|when, then| {
        when.method(GET).path(SLOW_PATH);
        then.status(200).delay(Duration::from_millis(2_500));
    });

    let url = server.url(SLOW_PATH);
    let configuration = common::build_configuration_for_url(
        &url,
        vec!["--requests", "3", "--concurrency", "3", "--timeout", "1"],
    );
    let report = common::run_load_test(configuration, None).await;

    common::validate_report(&report, 3);
    assert_eq!(report.success_count(), 0);
    assert_eq!(
        report.status_distribution().get(&CONNECTION_ERROR_STATUS),
        Some(&3)
    );
    assert_eq!(report.errors().get(&RequestErrorKind::Timeout), Some(&3));
    assert!(report.max_time() >= Duration::from_secs(1));
    assert!(report.total_time() >= report.max_time());
}

/// A target nobody listens on fails every request without aborting the run.
#[tokio::test]
async fn test_connection_refused() {
    // Nothing listens on port 1.
    let configuration = common::build_configuration_for_url(
        "http://127.0.0.1:1/",
        vec!["--requests", "4", "--concurrency", "2"],
    );
    let report = common::run_load_test(configuration, None).await;

    common::validate_report(&report, 4);
    assert_eq!(report.success_count(), 0);
    assert_eq!(
        report.status_distribution().get(&CONNECTION_ERROR_STATUS),
        Some(&4)
    );
    assert_eq!(report.errors().values().sum::<usize>(), 4);
}

/// Invalid configurations are rejected before any request is made.
#[tokio::test]
async fn test_invalid_configuration_sends_nothing() {
    let server = MockServer::start();
    let index = server.mock(|when, then| {
        when.method(GET).path(INDEX_PATH);
        then.status(200);
    });

    for custom in [
        vec!["--requests", "0"],
        vec!["--concurrency", "0"],
        vec!["--url", ""],
        vec!["--timeout", "never"],
    ] {
        let configuration = common::build_configuration(&server, custom);
        match LoadTest::initialize_with_config(configuration) {
            Err(LoadError::InvalidOption { .. }) => (),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("invalid configuration was accepted"),
        }
    }

    assert_eq!(index.calls(), 0);
}

/// The text and JSON reports contain the complete set of counts.
#[tokio::test]
async fn test_report_output() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(INDEX_PATH);
        then.status(503);
    });

    let configuration = common::build_configuration(&server, vec!["--requests", "5"]);
    let report = common::run_load_test(configuration, None).await;
    common::validate_report(&report, 5);

    let text = report.to_string();
    assert!(text.contains("Total requests: 5"));
    assert!(text.contains("Requests with status 200: 0"));
    assert!(text.contains("Status 503 Service Unavailable"));
    assert!(text.contains("Run window:"));

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["total_requests"], 5);
    assert_eq!(json["status_distribution"]["503"], 5);
    assert_eq!(json["success_count"], 0);
}
