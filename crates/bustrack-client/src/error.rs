//! Error types for the live channel and the REST collaborator.

use reqwest::StatusCode;

/// Failures of the live channel transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The channel could not be opened.
    #[error("failed to open channel to {address}: {reason}")]
    Connect {
        /// Address that was dialled.
        address: String,
        /// Underlying failure.
        reason: String,
    },

    /// The open channel reported a protocol or I/O error.
    #[error("channel error: {0}")]
    Protocol(String),

    /// The channel is already closed.
    #[error("channel is closed")]
    Closed,
}

/// Failures of REST collaborator calls.
///
/// These are the only errors expected to reach an end user; callers surface
/// them with a retry action.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent, or its body could not be decoded.
    #[error("request to {url} failed: {source}")]
    Request {
        /// Full request URL.
        url: String,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned {status}")]
    Status {
        /// Full request URL.
        url: String,
        /// Response status.
        status: StatusCode,
    },

    /// The configured base URL is not a valid URL.
    #[error("invalid API base URL {url}: {reason}")]
    InvalidUrl {
        /// The configured value.
        url: String,
        /// Why it failed to parse.
        reason: String,
    },
}
