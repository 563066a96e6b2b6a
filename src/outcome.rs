//! The result of a single GET request.
//!
//! Every job token consumed by a worker produces exactly one [`RequestOutcome`], whether
//! the server answered or the request never completed. Outcomes are immutable once built:
//! the only way to create one is through [`RequestOutcome::completed`] or
//! [`RequestOutcome::failed`], which keeps the status code and the optional error
//! consistent with each other.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use strum_macros::Display;

/// Synthetic status code used to bucket requests that never received an HTTP response.
///
/// Real HTTP status codes are three-digit values in the range 100-599, so 0 can never
/// collide with anything a server returns.
pub const CONNECTION_ERROR_STATUS: u16 = 0;

/// Broad classification of why a request failed to complete.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum RequestErrorKind {
    /// The per-request timeout expired.
    Timeout,
    /// Failed to establish a connection (refused, DNS failure, TLS handshake, etc).
    Connect,
    /// The request could not be built or sent.
    Request,
    /// The response body could not be read.
    Body,
    /// Anything the client was unable to classify.
    Other,
}

/// Why a request failed to complete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestError {
    pub kind: RequestErrorKind,
    pub detail: String,
}

impl RequestError {
    pub fn new(kind: RequestErrorKind, detail: impl Into<String>) -> Self {
        RequestError {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for RequestError {}

/// Classify reqwest failures.
impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> RequestError {
        let kind = if err.is_timeout() {
            RequestErrorKind::Timeout
        } else if err.is_connect() {
            RequestErrorKind::Connect
        } else if err.is_body() || err.is_decode() {
            RequestErrorKind::Body
        } else if err.is_request() || err.is_builder() {
            RequestErrorKind::Request
        } else {
            RequestErrorKind::Other
        };
        RequestError::new(kind, err.to_string())
    }
}

/// The recorded result of one completed or failed request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    status_code: u16,
    duration: Duration,
    error: Option<RequestError>,
}

impl RequestOutcome {
    /// The server answered with `status_code`, whatever its value.
    pub fn completed(status_code: u16, duration: Duration) -> Self {
        RequestOutcome {
            status_code,
            duration,
            error: None,
        }
    }

    /// The request never produced a response.
    pub fn failed(error: RequestError, duration: Duration) -> Self {
        RequestOutcome {
            status_code: CONNECTION_ERROR_STATUS,
            duration,
            error: Some(error),
        }
    }

    /// The HTTP status code, or [`CONNECTION_ERROR_STATUS`] if the request failed.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn error(&self) -> Option<&RequestError> {
        self.error.as_ref()
    }

    /// The status distribution bucket this outcome is counted under.
    pub fn bucket(&self) -> u16 {
        if self.error.is_some() {
            CONNECTION_ERROR_STATUS
        } else {
            self.status_code
        }
    }

    /// Only a 200 response without error counts as a success.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status_code == 200
    }
}
