//! # Gosling
//!
//! Gosling is a small HTTP load generator: it issues a fixed number of GET requests
//! against a single URL using a bounded pool of concurrent workers, then prints how the
//! server answered.
//!
//! Gosling uses [`reqwest`](https://docs.rs/reqwest/) to provide a pooled HTTP client
//! and [`tokio`](https://docs.rs/tokio/) to run the workers.
//!
//! ## Running a load test
//!
//! ```bash
//! $ gosling --url http://localhost:8080/health --requests 1000 --concurrency 10
//! ```
//!
//! Every request is one attempt: a request that times out or can't connect is recorded
//! under the synthetic status code 0 and the load test moves on. Any response the server
//! sends, whatever its status code, is a normal outcome. Only a 200 counts as a success.
//!
//! ## Load tests from code
//!
//! ```rust,no_run
//! use gosling::{LoadConfiguration, LoadError, LoadTest};
//! use gumdrop::Options;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LoadError> {
//!     let configuration = LoadConfiguration::parse_args_default(&[
//!         "--url",
//!         "http://localhost:8080/",
//!         "--requests",
//!         "100",
//!         "--concurrency",
//!         "4",
//!     ])
//!     .expect("valid options");
//!
//!     let report = LoadTest::initialize_with_config(configuration)?
//!         .execute()
//!         .await?;
//!     assert_eq!(report.processed(), 100);
//!     println!("{}", report);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## How a load test runs
//!
//! The workers pull job tokens from a shared [`flume`](https://docs.rs/flume/) queue and
//! push one [`RequestOutcome`](outcome::RequestOutcome) per token into a second channel.
//! A single aggregator task drains that channel and is the only writer of the
//! [`Report`](report::Report). The load test moves through each [`RunPhase`] in order:
//! jobs are enqueued and the queue closed, the workers drain it and exit, the outcome
//! channel closes and the aggregator drains it, and finally the total run time is
//! stamped into the report.
//!
//! ## License
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! you may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//! <http://www.apache.org/licenses/LICENSE-2.0>
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

#[macro_use]
extern crate log;

mod aggregator;
pub mod config;
mod dispatcher;
pub mod outcome;
pub mod report;
pub mod transport;
pub mod util;

use chrono::Local;
use gumdrop::Options;
use std::sync::Arc;
use std::{fmt, io, time};
use strum_macros::Display;

pub use crate::config::{LoadConfiguration, ReportFormat};
pub use crate::report::Report;

use crate::aggregator::Progress;
use crate::outcome::RequestOutcome;
use crate::transport::{ReqwestTransport, Transport};

/// Format used for the run window timestamps.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An enumeration of all errors a [`LoadTest`] can return.
#[derive(Debug)]
pub enum LoadError {
    /// Wraps a [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    Io(io::Error),
    /// Wraps a [`reqwest::Error`](https://docs.rs/reqwest/*/reqwest/struct.Error.html).
    Reqwest(reqwest::Error),
    /// Wraps a ['tokio::task::JoinError'](https://tokio-rs.github.io/tokio/doc/tokio/task/struct.JoinError.html).
    TokioJoin(tokio::task::JoinError),
    /// Wraps a [`serde_json::Error`](https://docs.rs/serde_json/*/serde_json/struct.Error.html).
    Json(serde_json::Error),
    /// Failed to parse the URL to load test.
    InvalidHost {
        /// The invalid URL that caused this error.
        host: String,
        /// An optional explanation of the error.
        detail: String,
        /// Wraps a [`url::ParseError`](https://docs.rs/url/*/url/enum.ParseError.html).
        parse_error: url::ParseError,
    },
    /// Invalid option or value specified.
    InvalidOption {
        /// The invalid option that caused this error.
        option: String,
        /// The invalid value that caused this error.
        value: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Job tokens could not be handed to the workers.
    Dispatch {
        /// An optional explanation of the error.
        detail: String,
    },
}

/// Implement a helper to provide a text description of all possible types of errors.
impl LoadError {
    fn describe(&self) -> &str {
        match *self {
            LoadError::Io(_) => "io::Error",
            LoadError::Reqwest(_) => "reqwest::Error",
            LoadError::TokioJoin(_) => "tokio::task::JoinError",
            LoadError::Json(_) => "serde_json::Error",
            LoadError::InvalidHost { .. } => "failed to parse url",
            LoadError::InvalidOption { .. } => "invalid option or value specified",
            LoadError::Dispatch { .. } => "failed to dispatch jobs to workers",
        }
    }
}

/// Implement format trait to allow displaying errors.
impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LoadError::Io(ref source) => write!(f, "LoadError: {} ({})", self.describe(), source),
            LoadError::Reqwest(ref source) => {
                write!(f, "LoadError: {} ({})", self.describe(), source)
            }
            LoadError::TokioJoin(ref source) => {
                write!(f, "LoadError: {} ({})", self.describe(), source)
            }
            LoadError::Json(ref source) => {
                write!(f, "LoadError: {} ({})", self.describe(), source)
            }
            LoadError::InvalidHost {
                ref host,
                ref parse_error,
                ..
            } => write!(
                f,
                "LoadError: {} '{}' ({})",
                self.describe(),
                host,
                parse_error
            ),
            LoadError::InvalidOption {
                ref option,
                ref value,
                ref detail,
            } => write!(
                f,
                "LoadError: {} {} = '{}': {}",
                self.describe(),
                option,
                value,
                detail
            ),
            LoadError::Dispatch { ref detail } => {
                write!(f, "LoadError: {} ({})", self.describe(), detail)
            }
        }
    }
}

// Define the lower level source of this error, if any.
impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            LoadError::Io(ref source) => Some(source),
            LoadError::Reqwest(ref source) => Some(source),
            LoadError::TokioJoin(ref source) => Some(source),
            LoadError::Json(ref source) => Some(source),
            LoadError::InvalidHost {
                ref parse_error, ..
            } => Some(parse_error),
            _ => None,
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> LoadError {
        LoadError::Reqwest(err)
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> LoadError {
        LoadError::Io(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for LoadError {
    fn from(err: tokio::task::JoinError) -> LoadError {
        LoadError::TokioJoin(err)
    }
}

/// Auto-convert serde_json errors.
impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> LoadError {
        LoadError::Json(err)
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
/// A [`LoadTest`] moves through each of the following phases, in order, exactly once.
pub enum RunPhase {
    /// The report exists, nothing has been dispatched.
    Idle,
    /// Job tokens are being handed to the workers.
    JobsEnqueuing,
    /// The job queue is closed, workers are finishing the remaining jobs.
    WorkersDraining,
    /// Every worker has exited, the aggregator is recording the remaining outcomes.
    ResultsDraining,
    /// Every outcome is recorded and the run time stamped into the report.
    Finalized,
}

impl RunPhase {
    /// The only phase allowed to follow this one.
    pub fn next(&self) -> Option<RunPhase> {
        match self {
            RunPhase::Idle => Some(RunPhase::JobsEnqueuing),
            RunPhase::JobsEnqueuing => Some(RunPhase::WorkersDraining),
            RunPhase::WorkersDraining => Some(RunPhase::ResultsDraining),
            RunPhase::ResultsDraining => Some(RunPhase::Finalized),
            RunPhase::Finalized => None,
        }
    }
}

/// A configured load test, ready to execute.
pub struct LoadTest {
    /// Configuration object holding options set when launching the load test.
    configuration: LoadConfiguration,
    /// Optional transport used instead of the default reqwest client.
    transport: Option<Arc<dyn Transport>>,
    /// Which phase the load test is currently operating in.
    run_phase: RunPhase,
}

impl LoadTest {
    /// Load configuration from the command line and initialize a [`LoadTest`].
    ///
    /// Exits the process with a usage message if the options can't be parsed, and after
    /// printing the version if `--version` is set. Otherwise the logger is initialized
    /// before the configuration is validated, so validation errors are logged.
    pub fn initialize() -> Result<LoadTest, LoadError> {
        let configuration = LoadConfiguration::parse_args_default_or_exit();
        if configuration.version {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            std::process::exit(0);
        }
        configuration.initialize_logger();
        LoadTest::initialize_with_config(configuration)
    }

    /// Initialize a [`LoadTest`] with an already loaded configuration.
    ///
    /// The configuration is validated here, so an invalid load test never starts.
    pub fn initialize_with_config(configuration: LoadConfiguration) -> Result<LoadTest, LoadError> {
        configuration.validate()?;
        Ok(LoadTest {
            configuration,
            transport: None,
            run_phase: RunPhase::Idle,
        })
    }

    /// Issue requests through `transport` instead of the default reqwest client.
    pub fn set_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn configuration(&self) -> &LoadConfiguration {
        &self.configuration
    }

    /// The number of workers this load test launches.
    pub fn concurrency(&self) -> usize {
        self.configuration.effective_concurrency()
    }

    fn set_run_phase(&mut self, phase: RunPhase) {
        debug_assert_eq!(self.run_phase.next(), Some(phase));
        debug!("entering {} phase", phase);
        self.run_phase = phase;
    }

    /// Execute the load test, returning the final report.
    ///
    /// Exactly `requests` requests are issued. Failed requests never abort the run, so an
    /// error here means the load test couldn't be set up or a task panicked.
    pub async fn execute(mut self) -> Result<Report, LoadError> {
        let total_requests = self.configuration.requests;
        let concurrency = self.concurrency();
        let url = self.configuration.url.clone();

        let transport: Arc<dyn Transport> = match self.transport.take() {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(
                self.configuration.request_timeout(),
                concurrency,
            )?),
        };

        info!(
            "load testing {} with {} requests across {} workers",
            url, total_requests, concurrency
        );

        let report = Report::new(&url, total_requests, concurrency);
        let (job_tx, job_rx) = flume::unbounded();
        let (outcome_tx, outcome_rx) = flume::unbounded::<RequestOutcome>();

        // Workers block on the empty job queue until tokens arrive.
        let workers =
            dispatcher::launch_workers(concurrency, &url, transport, job_rx, outcome_tx.clone());
        let aggregator = tokio::spawn(aggregator::aggregator_main(
            report,
            outcome_rx,
            Progress::new(total_requests, !self.configuration.no_progress),
        ));

        self.set_run_phase(RunPhase::JobsEnqueuing);
        let started = time::Instant::now();
        let started_at = Local::now();
        for job in 0..total_requests {
            if job_tx.send(job).is_err() {
                return Err(LoadError::Dispatch {
                    detail: format!("every worker exited before job {} was queued", job),
                });
            }
        }
        // Closing the queue lets workers exit once it is drained.
        drop(job_tx);

        self.set_run_phase(RunPhase::WorkersDraining);
        let mut issued = 0;
        for worker in futures::future::join_all(workers).await {
            issued += worker?;
        }
        debug!("workers issued {} requests", issued);

        // The workers' senders are gone, dropping the last one closes the channel.
        self.set_run_phase(RunPhase::ResultsDraining);
        drop(outcome_tx);
        let mut report = aggregator.await?;

        report.finalize(
            started.elapsed(),
            started_at.format(TIMESTAMP_FORMAT).to_string(),
            Local::now().format(TIMESTAMP_FORMAT).to_string(),
        );
        self.set_run_phase(RunPhase::Finalized);
        info!(
            "load test complete: {} requests in {:.3}s",
            report.processed(),
            report.total_time().as_secs_f64()
        );

        Ok(report)
    }
}
