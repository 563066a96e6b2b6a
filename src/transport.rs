//! Performing a single GET request.
//!
//! Workers don't talk to an HTTP client directly, they go through the [`Transport`] trait.
//! The default implementation, [`ReqwestTransport`], wraps a single
//! [`reqwest::Client`](https://docs.rs/reqwest/*/reqwest/struct.Client.html) shared by all
//! workers so connections are pooled and reused across requests.
//!
//! [`make_request`] wraps one call to [`Transport::get`] with timing and turns the result
//! into a [`RequestOutcome`]. There are no retries: one job token is one attempt.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};

use crate::outcome::{RequestError, RequestOutcome};
use crate::LoadError;

/// User agent sent with every request.
static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The capability to issue one GET request.
///
/// Implementations must be safe to share between all workers. A response with any status
/// code is `Ok`, only a request that never produced a response is an `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one GET request against `url` and return the response status code.
    async fn get(&self, url: &str) -> Result<u16, RequestError>;
}

/// A [`Transport`] backed by a pooled reqwest client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client that fails any request taking longer than `timeout`, keeping up to
    /// `max_idle_per_host` idle connections available for reuse.
    pub fn new(timeout: Duration, max_idle_per_host: usize) -> Result<Self, LoadError> {
        trace!(
            "new client: timeout {:?}, max_idle_per_host {}",
            timeout,
            max_idle_per_host
        );
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .pool_max_idle_per_host(max_idle_per_host)
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<u16, RequestError> {
        let response = self.client.get(url).send().await?;
        let status_code = response.status().as_u16();
        // Drain the body so the connection goes back to the pool. The status already
        // arrived, so a failure here doesn't change the outcome.
        if let Err(e) = response.bytes().await {
            debug!("{}: failed to read response body: {}", url, e);
        }
        Ok(status_code)
    }
}

/// Perform exactly one GET request, timing it from just before it is sent until the
/// response or failure is known.
pub async fn make_request(transport: &dyn Transport, url: &str) -> RequestOutcome {
    let started = Instant::now();
    let result = transport.get(url).await;
    let elapsed = started.elapsed();

    match result {
        Ok(status_code) => {
            trace!("{}: status_code {} in {:?}", url, status_code, elapsed);
            RequestOutcome::completed(status_code, elapsed)
        }
        Err(error) => {
            debug!("{}: {} after {:?}", url, error, elapsed);
            RequestOutcome::failed(error, elapsed)
        }
    }
}
