//! The worker pool.
//!
//! A fixed number of workers share one job queue and one outcome channel. Each worker
//! pulls a job token, performs one request and sends the outcome on, until the job queue
//! is both closed and drained. Workers race for tokens, so which worker issues which
//! request is unordered.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::outcome::RequestOutcome;
use crate::transport::{self, Transport};

/// Placeholder bounding the number of requests: the index of the request to issue.
pub type JobToken = usize;

/// Launch `concurrency` workers, returning their join handles.
///
/// Each handle resolves to the number of requests that worker issued. Workers terminate
/// once every sender of `jobs` has been dropped and the queue is empty.
pub(crate) fn launch_workers(
    concurrency: usize,
    url: &str,
    transport: Arc<dyn Transport>,
    jobs: flume::Receiver<JobToken>,
    outcomes: flume::Sender<RequestOutcome>,
) -> Vec<JoinHandle<usize>> {
    let url: Arc<str> = Arc::from(url);
    (0..concurrency)
        .map(|worker_number| {
            tokio::spawn(worker_main(
                worker_number,
                url.clone(),
                transport.clone(),
                jobs.clone(),
                outcomes.clone(),
            ))
        })
        .collect()
}

/// A single worker: one request per job token until the queue is closed and drained.
pub(crate) async fn worker_main(
    worker_number: usize,
    url: Arc<str>,
    transport: Arc<dyn Transport>,
    jobs: flume::Receiver<JobToken>,
    outcomes: flume::Sender<RequestOutcome>,
) -> usize {
    debug!("launching worker {}...", worker_number);

    let mut issued = 0;
    // An error here means every sender is gone and the queue is empty.
    while let Ok(job) = jobs.recv_async().await {
        let outcome = transport::make_request(transport.as_ref(), &url).await;
        trace!(
            "[worker {}]: request {} finished with status {}",
            worker_number,
            job,
            outcome.bucket()
        );
        issued += 1;

        if outcomes.send_async(outcome).await.is_err() {
            // Only happens if the aggregator is gone, nothing left can be recorded.
            error!(
                "[worker {}]: outcome channel closed, dropping request {}",
                worker_number, job
            );
            break;
        }
    }

    debug!(
        "exiting worker {} after {} requests...",
        worker_number, issued
    );
    issued
}
