//! The aggregate report produced by a load test.
//!
//! A [`Report`] is created once per run with the number of requests fixed up front. It is
//! then owned by the aggregator task, which is the only writer: every outcome passes
//! through [`Report::record`] exactly once. After all outcomes are recorded the
//! orchestrator stamps the total run time and the report becomes read-only.
//!
//! Reports render either as a human readable table (via [`Display`](std::fmt::Display))
//! or as JSON.

use http::StatusCode;
use itertools::Itertools;
use num_format::{Locale, ToFormattedString};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use crate::config::ReportFormat;
use crate::outcome::{RequestErrorKind, RequestOutcome, CONNECTION_ERROR_STATUS};
use crate::LoadError;

/// Aggregated results of a load test.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    /// The URL that was load tested.
    url: String,
    /// How many requests the run was configured to issue.
    total_requests: usize,
    /// How many workers issued requests.
    concurrency: usize,
    /// How many outcomes have been recorded so far.
    processed: usize,
    /// Requests answered with a 200 and no error.
    success_count: usize,
    /// Occurrences of each status code, with transport failures under status 0.
    status_distribution: HashMap<u16, usize>,
    /// Transport failures broken down by cause.
    errors: BTreeMap<RequestErrorKind, usize>,
    /// Fastest individual request.
    #[serde(serialize_with = "serialize_millis")]
    min_time: Duration,
    /// Slowest individual request.
    #[serde(serialize_with = "serialize_millis")]
    max_time: Duration,
    /// Sum of all individual request durations.
    #[serde(serialize_with = "serialize_millis")]
    total_request_time: Duration,
    /// Wall-clock time from the first job enqueued until the last outcome was recorded.
    #[serde(serialize_with = "serialize_millis")]
    total_time: Duration,
    /// Formatted timestamp of when jobs started being enqueued.
    started: Option<String>,
    /// Formatted timestamp of when the last outcome was recorded.
    stopped: Option<String>,
}

/// Durations are reported in fractional milliseconds.
fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(as_millis(*duration))
}

impl Report {
    /// Create an empty report for a run of `total_requests` requests.
    pub fn new(url: &str, total_requests: usize, concurrency: usize) -> Self {
        Report {
            url: url.to_string(),
            total_requests,
            concurrency,
            processed: 0,
            success_count: 0,
            status_distribution: HashMap::new(),
            errors: BTreeMap::new(),
            min_time: Duration::ZERO,
            max_time: Duration::ZERO,
            total_request_time: Duration::ZERO,
            total_time: Duration::ZERO,
            started: None,
            stopped: None,
        }
    }

    /// Record a single outcome.
    ///
    /// Increments the status bucket of the outcome (0 for transport failures) and, if the
    /// request was answered with a 200, the success counter. Returns `false` and leaves the
    /// report untouched if all `total_requests` outcomes were already recorded.
    pub fn record(&mut self, outcome: &RequestOutcome) -> bool {
        if self.processed >= self.total_requests {
            warn!(
                "discarding outcome beyond the configured {} requests",
                self.total_requests
            );
            return false;
        }
        self.processed += 1;

        *self.status_distribution.entry(outcome.bucket()).or_insert(0) += 1;
        if outcome.is_success() {
            self.success_count += 1;
        }
        if let Some(error) = outcome.error() {
            *self.errors.entry(error.kind).or_insert(0) += 1;
        }

        let duration = outcome.duration();
        self.min_time = update_min_time(self.min_time, duration, self.processed == 1);
        self.max_time = update_max_time(self.max_time, duration);
        self.total_request_time += duration;

        true
    }

    /// Stamp the run time into the report once every outcome has been recorded.
    pub(crate) fn finalize(&mut self, total_time: Duration, started: String, stopped: String) {
        self.total_time = total_time;
        self.started = Some(started);
        self.stopped = Some(stopped);
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn total_requests(&self) -> usize {
        self.total_requests
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn status_distribution(&self) -> &HashMap<u16, usize> {
        &self.status_distribution
    }

    /// Transport failure counts by cause.
    pub fn errors(&self) -> &BTreeMap<RequestErrorKind, usize> {
        &self.errors
    }

    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    pub fn min_time(&self) -> Duration {
        self.min_time
    }

    pub fn max_time(&self) -> Duration {
        self.max_time
    }

    /// Mean duration of all recorded requests.
    pub fn average_time(&self) -> Duration {
        if self.processed == 0 {
            Duration::ZERO
        } else {
            let nanos = self.total_request_time.as_nanos() / self.processed as u128;
            Duration::from_nanos(nanos as u64)
        }
    }

    /// Serialize the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report to stdout in the requested format.
    pub fn print(&self, format: &ReportFormat) -> Result<(), LoadError> {
        match format {
            ReportFormat::Text => println!("{}", self),
            ReportFormat::Json => println!("{}", self.to_json()?),
        }
        Ok(())
    }

    /// Overview of the run configuration and timing.
    fn fmt_overview(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "\n === LOAD TEST REPORT ===")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " Target URL: {}", self.url)?;
        if let (Some(started), Some(stopped)) = (&self.started, &self.stopped) {
            writeln!(fmt, " Run window: {} - {}", started, stopped)?;
        }
        writeln!(
            fmt,
            " Total time: {:.3}s",
            self.total_time.as_secs_f64()
        )?;
        writeln!(
            fmt,
            " Total requests: {} (concurrency: {})",
            format_number(self.total_requests),
            format_number(self.concurrency)
        )?;
        writeln!(
            fmt,
            " Requests with status 200: {}",
            format_number(self.success_count)
        )
    }

    /// Table of every observed status code, in ascending order.
    fn fmt_status_codes(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<40} | {:>35} ", "Status code", "Requests")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (status_code, count) in self.status_distribution.iter().sorted() {
            writeln!(
                fmt,
                " {:<40} | {:>35} ",
                status_label(*status_code),
                format_number(*count)
            )?;
        }
        Ok(())
    }

    /// Fastest, mean and slowest individual request.
    fn fmt_response_times(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.processed == 0 {
            return Ok(());
        }
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>15} | {:>15} | {:>15} ",
            "Response time (ms)", "Min", "Average", "Max"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>15.2} | {:>15.2} | {:>15.2} ",
            "",
            as_millis(self.min_time),
            as_millis(self.average_time()),
            as_millis(self.max_time)
        )
    }

    /// Transport failures by cause, most frequent first.
    fn fmt_errors(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return Ok(());
        }
        writeln!(
            fmt,
            "\n === ERRORS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<11} | Error", "Count")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (kind, count) in self
            .errors
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)))
        {
            writeln!(fmt, " {:<12}  {}", format_number(*count), kind)?;
        }
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_overview(fmt)?;
        self.fmt_status_codes(fmt)?;
        self.fmt_response_times(fmt)?;
        self.fmt_errors(fmt)?;
        write!(
            fmt,
            " ------------------------------------------------------------------------------"
        )
    }
}

/// Human readable name for a status bucket.
fn status_label(status_code: u16) -> String {
    if status_code == CONNECTION_ERROR_STATUS {
        return "Connection errors".to_string();
    }
    match StatusCode::from_u16(status_code)
        .ok()
        .and_then(|s| s.canonical_reason())
    {
        Some(reason) => format!("Status {} {}", status_code, reason),
        None => format!("Status {}", status_code),
    }
}

fn as_millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Format large number in locale appropriate style.
pub(crate) fn format_number(number: usize) -> String {
    (number).to_formatted_string(&Locale::en)
}

/// A helper function that updates the minimum time. The first recorded time is
/// always the minimum.
pub(crate) fn update_min_time(current_min: Duration, time: Duration, first: bool) -> Duration {
    if first || time < current_min {
        time
    } else {
        current_min
    }
}

/// A helper function that updates the maximum time.
pub(crate) fn update_max_time(current_max: Duration, time: Duration) -> Duration {
    if current_max < time {
        time
    } else {
        current_max
    }
}
