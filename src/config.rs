//! Functions and structures related to configuring a load test.
//!
//! A load test is configured at run time by passing in the options and flags defined by
//! the [`LoadConfiguration`] structure. Every option is validated before any request is
//! made; see [`LoadConfiguration::validate`].

use gumdrop::Options;
use serde::{Deserialize, Serialize};
use simplelog::*;
use std::path::PathBuf;
use std::time::Duration;
use strum_macros::{Display, EnumString};

use crate::util;
use crate::LoadError;

/// Per-request timeout used when `--timeout` isn't set.
pub const DEFAULT_TIMEOUT: &str = "30";

/// Output formats for the final report.
#[derive(Clone, Debug, Default, Display, EnumString, PartialEq, Eq, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReportFormat {
    /// Human readable tables.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Runtime options available when launching a load test.
///
/// Help is generated for all of these options by passing a `-h` flag. The help is derived
/// from this structure by [`gumdrop`](https://docs.rs/gumdrop/).
#[derive(Options, Debug, Clone, Default, Serialize, Deserialize)]
#[options(
    help = r#"Gosling issues a fixed number of HTTP GET requests against a single URL using a
bounded pool of concurrent workers, then prints a report of the results.

The following runtime options are available:"#
)]
pub struct LoadConfiguration {
    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Prints version information
    #[options(short = "V", help = "Prints version information\n")]
    pub version: bool,

    /// Defines the URL to load test (ie http://10.21.32.33/health)
    #[options(short = "u")]
    pub url: String,
    /// Sets the total number of requests to issue
    #[options(short = "n", meta = "N")]
    pub requests: usize,
    /// Sets the number of concurrent workers (default: 1)
    #[options(short = "c", meta = "N", default = "1")]
    pub concurrency: usize,
    /// Sets the per-request timeout (default: 30s)
    #[options(
        short = "t",
        meta = "TIME",
        default = "30",
        help = "Sets the per-request timeout (default: 30s)\n\nReport:"
    )]
    pub timeout: String,

    /// Sets the report format (text, json)
    #[options(no_short, meta = "FORMAT")]
    pub report_format: ReportFormat,
    /// Doesn't print progress while the load test runs
    #[options(no_short, help = "Doesn't print progress while the load test runs\n\nLogging:")]
    pub no_progress: bool,

    /// Enables log file and sets name
    #[options(short = "G", meta = "NAME")]
    pub log_file: String,
    /// Increases log file level (-g, -gg, etc)
    #[options(short = "g", count)]
    pub log_level: u8,
    /// Decreases verbosity (-q, -qq, etc)
    #[options(count, short = "q")]
    pub quiet: u8,
    /// Increases verbosity (-v, -vv, etc)
    #[options(count, short = "v")]
    pub verbose: u8,
}

impl LoadConfiguration {
    /// Confirm the configuration describes a load test that can run.
    ///
    /// Fails on an empty or unparseable URL, a request count or concurrency of zero, and
    /// a timeout that isn't a positive timespan.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.url.is_empty() {
            return Err(LoadError::InvalidOption {
                option: "`configuration.url`".to_string(),
                value: self.url.clone(),
                detail: "A URL must be defined via the --url option.".to_string(),
            });
        }

        if let Err(parse_error) = url::Url::parse(&self.url) {
            return Err(LoadError::InvalidHost {
                host: self.url.clone(),
                detail: "Invalid URL defined via the --url option.".to_string(),
                parse_error,
            });
        }

        if self.requests == 0 {
            return Err(LoadError::InvalidOption {
                option: "`configuration.requests`".to_string(),
                value: self.requests.to_string(),
                detail: "The --requests option must be set to at least 1.".to_string(),
            });
        }

        if self.concurrency == 0 {
            return Err(LoadError::InvalidOption {
                option: "`configuration.concurrency`".to_string(),
                value: self.concurrency.to_string(),
                detail: "The --concurrency option must be set to at least 1.".to_string(),
            });
        }

        if self.timeout_seconds() == 0 {
            return Err(LoadError::InvalidOption {
                option: "`configuration.timeout`".to_string(),
                value: self.timeout.clone(),
                detail: "The --timeout option must be a positive timespan, ie 30, 30s, 1m."
                    .to_string(),
            });
        }

        Ok(())
    }

    /// The number of workers actually launched: never more workers than requests.
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency > self.requests {
            debug!(
                "reducing concurrency from {} to {} to match requests",
                self.concurrency, self.requests
            );
            self.requests
        } else {
            self.concurrency
        }
    }

    fn timeout_seconds(&self) -> usize {
        if self.timeout.is_empty() {
            util::parse_timespan(DEFAULT_TIMEOUT)
        } else {
            util::parse_timespan(&self.timeout)
        }
    }

    /// The per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds() as u64)
    }

    /// Initialize the logger which writes to standard out and optionally to a log file.
    pub fn initialize_logger(&self) {
        // Configure debug output level.
        let debug_level = match self.verbose {
            0 => match self.quiet {
                0 => LevelFilter::Info,
                _ => LevelFilter::Warn,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Configure log file level.
        let log_level = match self.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let log_file: Option<PathBuf> = if !self.log_file.is_empty() {
            Some(PathBuf::from(&self.log_file))
        } else {
            None
        };

        let mut loggers: Vec<Box<dyn SharedLogger>> =
            vec![SimpleLogger::new(debug_level, Config::default())];
        if let Some(path) = log_file.as_ref() {
            match std::fs::File::create(path) {
                Ok(file) => loggers.push(WriteLogger::new(log_level, Config::default(), file)),
                Err(e) => eprintln!("failed to create log file {}: {}", path.display(), e),
            }
        }

        if let Err(e) = CombinedLogger::init(loggers) {
            eprintln!("failed to initialize CombinedLogger: {}", e);
        }

        if let Some(path) = log_file {
            info!("Writing to log file: {}", path.display());
        }
        debug!("Output verbosity level: {}", debug_level);
        debug!("Logfile verbosity level: {}", log_level);
    }
}
