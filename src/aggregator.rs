//! The single consumer of request outcomes.
//!
//! The aggregator task owns the [`Report`] for the duration of the run: it is the only
//! code that mutates it, so no lock is needed. It returns the report once the outcome
//! channel is closed and drained, which can only happen after every worker has exited.

use std::io::{self, Write};

use crate::outcome::RequestOutcome;
use crate::report::Report;

/// How many recorded outcomes between progress updates.
pub const PROGRESS_INTERVAL: usize = 100;

/// Advisory progress line, rewritten in place on stdout.
#[derive(Clone, Debug)]
pub(crate) struct Progress {
    total: usize,
    interval: usize,
    enabled: bool,
}

impl Progress {
    pub(crate) fn new(total: usize, enabled: bool) -> Self {
        Progress {
            total,
            interval: PROGRESS_INTERVAL,
            enabled,
        }
    }

    /// Whether progress should be displayed after `processed` outcomes.
    fn is_due(&self, processed: usize) -> bool {
        processed > 0 && (processed % self.interval == 0 || processed == self.total)
    }

    fn update(&self, processed: usize) {
        if !self.enabled || !self.is_due(processed) {
            return;
        }
        let mut stdout = io::stdout().lock();
        // Progress is best effort.
        let _ = write!(
            stdout,
            "\rProgress: {}/{} requests completed",
            processed, self.total
        );
        let _ = stdout.flush();
    }

    fn finish(&self, processed: usize) {
        if self.enabled && processed > 0 {
            println!();
        }
    }
}

/// Record every outcome until the channel is closed, then return the report.
pub(crate) async fn aggregator_main(
    mut report: Report,
    outcomes: flume::Receiver<RequestOutcome>,
    progress: Progress,
) -> Report {
    debug!("launching aggregator...");

    // An error here means every worker has exited and the channel is drained.
    while let Ok(outcome) = outcomes.recv_async().await {
        if report.record(&outcome) {
            progress.update(report.processed());
        }
    }
    progress.finish(report.processed());

    debug!(
        "exiting aggregator after recording {} outcomes...",
        report.processed()
    );
    report
}
