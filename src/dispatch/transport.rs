//! HTTP delivery.
//!
//! # Responsibilities
//! - Build the shared client with a bounded request timeout
//! - POST one JSON payload per record to the resolved endpoint URL
//! - Map client errors and non-2xx responses into `TransportError`
//!
//! The caller (handler.rs) decides what to do with a failure; here a
//! failure is just a value.

use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};

use crate::error::TransportError;

/// Build the HTTP client every send goes through. The timeout bounds both
/// connect and response time so a hung endpoint cannot stall a blocking
/// caller or leak background tasks.
pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .expect("HTTP client construction must succeed")
}

/// Join the base URL and endpoint path with exactly one slash.
pub(crate) fn join_url(server_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        server_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// POST `payload` to `url`. Success is any 2xx response.
pub(crate) async fn deliver(
    client: &Client,
    url: &str,
    payload: &Map<String, Value>,
) -> Result<(), TransportError> {
    let response = client
        .post(url)
        .json(payload)
        .send()
        .await
        .map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            url: url.to_string(),
            status,
        });
    }
    Ok(())
}
