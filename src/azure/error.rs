//! Error types for the Azure Resource Manager backend.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::model::InvalidResourceId;

/// HTTP status codes worth another attempt: request timeout, throttling, and
/// transient server-side failures.
const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Errors raised by the Azure backend.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AzureBackendError {
    /// Raised when the configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when no access token can be obtained.
    #[error("credential error: {0}")]
    Credential(String),
    /// Raised when the management endpoint cannot be reached or the
    /// connection times out.
    #[error("connection error: {0}")]
    Connection(String),
    /// Raised for transport failures other than connection problems.
    #[error("request failed: {0}")]
    Request(String),
    /// Raised when Resource Manager answers with an error status.
    #[error("Azure returned HTTP {status} ({code}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// `error.code` from the response body, or `Unknown`.
        code: String,
        /// `error.message` from the response body, or the raw body.
        message: String,
        /// Delay requested through the `Retry-After` header.
        retry_after: Option<Duration>,
    },
    /// Raised when a long-running operation ends as `Failed` or `Canceled`.
    #[error("{action} of {resource} ended with status {status}: {message}")]
    OperationFailed {
        /// Action being waited on.
        action: String,
        /// Resource identifier.
        resource: String,
        /// Terminal status reported by the service.
        status: String,
        /// Failure detail reported by the service.
        message: String,
    },
    /// Raised when a long-running operation exceeds the operation timeout.
    #[error("timeout waiting for {action} of {resource}")]
    Timeout {
        /// Action being waited on.
        action: String,
        /// Resource identifier.
        resource: String,
    },
    /// Raised when the service points a monitor or next page outside the
    /// management endpoint.
    #[error("refusing to follow {url}: not under {endpoint}")]
    ForeignUrl {
        /// URL advertised by the service.
        url: String,
        /// Configured management endpoint.
        endpoint: String,
    },
    /// Raised when a response body cannot be interpreted.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// Raised when the service returns a malformed resource identifier.
    #[error(transparent)]
    InvalidResourceId(#[from] InvalidResourceId),
}

impl AzureBackendError {
    /// Returns `true` when the failure is transient and the request may be
    /// sent again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Api { status, .. } => RETRYABLE_STATUSES.contains(status),
            _ => false,
        }
    }

    /// Delay the service asked for before the next attempt, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub(super) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<ConfigError> for AzureBackendError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<serde_json::Error> for AzureBackendError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<azure_core::Error> for AzureBackendError {
    fn from(value: azure_core::Error) -> Self {
        Self::Credential(value.to_string())
    }
}
