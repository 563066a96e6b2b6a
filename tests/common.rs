use async_trait::async_trait;
use gumdrop::Options;
use httpmock::MockServer;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gosling::outcome::{RequestError, RequestErrorKind};
use gosling::transport::Transport;
use gosling::{LoadConfiguration, LoadTest, Report};

// Not all functions are used by all tests, so we enable allow(dead_code) to avoid
// compiler warnings during testing.

/// The following options are configured by default, if not set to a custom value:
///  --url <mock-server>/
///  --requests 10
///  --concurrency 1
///  --no-progress
#[allow(dead_code)]
pub fn build_configuration(server: &MockServer, custom: Vec<&str>) -> LoadConfiguration {
    // Declare server_url here no matter what, so its lifetime is sufficient when needed.
    let server_url = server.url("/");
    build_configuration_for_url(&server_url, custom)
}

/// Same as `build_configuration`, for targets that aren't a mock server.
#[allow(dead_code)]
pub fn build_configuration_for_url(url: &str, custom: Vec<&str>) -> LoadConfiguration {
    // Start with an empty configuration.
    let mut configuration: Vec<&str> = vec![];

    // Merge in all custom options first.
    configuration.extend_from_slice(&custom);

    if !configuration.contains(&"--url") {
        configuration.extend_from_slice(&["--url", url]);
    }
    if !configuration.contains(&"--requests") {
        configuration.extend_from_slice(&["--requests", "10"]);
    }
    if !configuration.contains(&"--concurrency") {
        configuration.extend_from_slice(&["--concurrency", "1"]);
    }
    // Keep test output readable.
    configuration.push("--no-progress");

    // Parse these options to generate a LoadConfiguration.
    LoadConfiguration::parse_args_default(&configuration)
        .expect("failed to parse options and generate a configuration")
}

/// Run the load test, returning the Report.
#[allow(dead_code)]
pub async fn run_load_test(
    configuration: LoadConfiguration,
    transport: Option<Arc<dyn Transport>>,
) -> Report {
    let mut load_test =
        LoadTest::initialize_with_config(configuration).expect("invalid configuration");
    if let Some(transport) = transport {
        load_test = load_test.set_transport(transport);
    }
    load_test.execute().await.expect("load test failed")
}

/// Check the invariants every completed load test must satisfy.
#[allow(dead_code)]
pub fn validate_report(report: &Report, requests: usize) {
    assert_eq!(report.total_requests(), requests);
    assert_eq!(report.processed(), requests);
    assert_eq!(report.status_distribution().values().sum::<usize>(), requests);
    assert_eq!(
        report.success_count(),
        *report.status_distribution().get(&200).unwrap_or(&0)
    );
    assert!(report.status_distribution().values().all(|c| *c <= requests));
    assert!(report.total_time() >= report.max_time());
}

/// Fails the first `failures` calls with a connection error, then answers with `status`.
#[allow(dead_code)]
pub struct ScriptedTransport {
    failures: usize,
    status: u16,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(failures: usize, status: u16) -> Self {
        ScriptedTransport {
            failures,
            status,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, _url: &str) -> Result<u16, RequestError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(RequestError::new(
                RequestErrorKind::Connect,
                "connection refused",
            ))
        } else {
            Ok(self.status)
        }
    }
}

/// Sleeps a random few milliseconds and answers with a random status, failing some
/// requests, so worker completions interleave differently on every run.
#[allow(dead_code)]
#[derive(Default)]
pub struct JitterTransport {
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl JitterTransport {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for JitterTransport {
    async fn get(&self, _url: &str) -> Result<u16, RequestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, pick) = {
            let mut rng = rand::rng();
            (rng.random_range(0..5u64), rng.random_range(0..4u8))
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        match pick {
            0 => Err(RequestError::new(RequestErrorKind::Timeout, "timed out")),
            1 => Ok(503),
            _ => Ok(200),
        }
    }
}
