//! Per-process session identity.
//!
//! One pseudo-random identifier per interpreter session, used to correlate
//! telemetry records from the same process. Generated on first use and
//! stable until the process exits; never persisted.

use std::sync::OnceLock;

use chrono::Utc;
use sha2::{Digest, Sha256};

static SESSION_ID: OnceLock<String> = OnceLock::new();

/// Lazily-derived session identifier.
pub struct SessionId;

impl SessionId {
    /// The session identifier for this process. Derived on first call and
    /// memoized for the process lifetime.
    pub fn current() -> &'static str {
        SESSION_ID.get_or_init(Self::generate)
    }

    /// Derive a fresh identifier from login, host, pid and the current
    /// timestamp. Does not touch the memoized value.
    pub fn generate() -> String {
        let login = login_name();
        let host = host_name();
        let timestamp = Utc::now().to_rfc3339();
        let seed = format!("{login}@{host}:{}:{timestamp}", std::process::id());

        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Local user identity, also recorded in every telemetry payload.
pub(crate) fn login_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}
