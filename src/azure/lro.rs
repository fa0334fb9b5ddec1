//! Interpretation of Resource Manager long-running operation responses.
//!
//! A mutating request may complete immediately or hand back a polling
//! target. `Azure-AsyncOperation` wins over `Location`; without either the
//! resource's own `properties.provisioningState` is polled.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use serde_json::Value;

const ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Longest `Retry-After` honoured; larger hints are cut down to this.
pub(crate) const MAX_RETRY_AFTER: Duration = Duration::from_secs(600);

/// State of a long-running operation as reported by the service.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum OperationStatus {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl OperationStatus {
    /// Maps a status string. Anything that is not terminal (`Accepted`,
    /// `Creating`, `Updating`, `Deleting`, ...) counts as in progress.
    pub(crate) fn from_wire(value: &str) -> Self {
        if value.eq_ignore_ascii_case("succeeded") {
            Self::Succeeded
        } else if value.eq_ignore_ascii_case("failed") {
            Self::Failed
        } else if value.eq_ignore_ascii_case("canceled") || value.eq_ignore_ascii_case("cancelled")
        {
            Self::Canceled
        } else {
            Self::InProgress
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InProgress => "InProgress",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
        };
        f.write_str(label)
    }
}

/// Where to look for the outcome of an accepted request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum PollTarget {
    /// Poll the status monitor and read its `status` field.
    AsyncOperation(String),
    /// Poll until the URL stops answering `202 Accepted`.
    Location(String),
}

/// Picks the polling target advertised by a response.
pub(crate) fn poll_target(headers: &HeaderMap) -> Option<PollTarget> {
    header_str(headers, ASYNC_OPERATION)
        .map(|url| PollTarget::AsyncOperation(url.to_owned()))
        .or_else(|| {
            headers
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(|url| PollTarget::Location(url.to_owned()))
        })
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Reads `Retry-After` given in whole seconds, capped at
/// [`MAX_RETRY_AFTER`]. HTTP dates are ignored and the configured interval
/// applies instead.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|seconds| Duration::from_secs(seconds).min(MAX_RETRY_AFTER))
}

/// `true` once a `Location` poll answers with anything but `202`.
pub(crate) fn location_done(status: StatusCode) -> bool {
    status != StatusCode::ACCEPTED
}

/// Status reported by an `Azure-AsyncOperation` monitor body.
pub(crate) fn async_operation_status(body: &Value) -> OperationStatus {
    body.get("status")
        .and_then(Value::as_str)
        .map_or(OperationStatus::InProgress, OperationStatus::from_wire)
}

/// `properties.provisioningState` of a resource body, when present.
pub(crate) fn provisioning_state(body: &Value) -> Option<OperationStatus> {
    body.pointer("/properties/provisioningState")
        .and_then(Value::as_str)
        .map(OperationStatus::from_wire)
}

/// Failure detail carried by a failed operation body.
pub(crate) fn failure_message(body: &Value) -> String {
    body.get("error")
        .and_then(|error| {
            let code = error.get("code").and_then(Value::as_str);
            let message = error.get("message").and_then(Value::as_str);
            match (code, message) {
                (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                (None, Some(message)) => Some(message.to_owned()),
                (Some(code), None) => Some(code.to_owned()),
                (None, None) => None,
            }
        })
        .unwrap_or_else(|| String::from("no error detail returned"))
}
