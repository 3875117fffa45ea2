//! Error taxonomy shared by the registry and dispatch subsystems.
//!
//! Registry and configuration errors are caller-visible and synchronous:
//! they represent programmer mistakes and fail fast. Delivery errors are
//! absorbed at the dispatch boundary and only ever reach the log.

use reqwest::StatusCode;

/// Caller-visible errors raised by registry and dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The named service has no configured endpoint.
    #[error("endpoint '{0}' not found")]
    UnknownService(String),

    /// A function identifier that is empty or contains whitespace.
    #[error("invalid function identifier {0:?}: identifiers must be non-empty and contain no whitespace")]
    InvalidIdentifier(String),

    /// Attempt to deregister an identifier that was never registered.
    #[error("'{identifier}' is not registered for service '{service}'")]
    NotRegistered { service: String, identifier: String },

    /// A server URL that does not parse as an absolute URL.
    #[error("invalid server url '{url}': {source}")]
    InvalidServerUrl {
        url: String,
        source: url::ParseError,
    },
}

/// Delivery failures. Never propagated out of the dispatch handler in
/// either mode; reported through the log only.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failure, timeout, or other client-side request error.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-2xx status.
    #[error("{url} responded with status {status}")]
    Status { url: String, status: StatusCode },
}
