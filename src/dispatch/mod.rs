//! Telemetry dispatch.
//!
//! # Data Flow
//! ```text
//! call context (function, args, kwargs, session id)
//!     → record.rs (payload assembly: reserved fields + extra - popped)
//!     → handler.rs (service validation, mode selection, global state)
//!     → transport.rs (POST to server_url/endpoint, bounded timeout)
//! ```
//!
//! # Design Decisions
//! - One logical handler per process behind an explicit accessor; delivery
//!   configuration must be globally consistent
//! - Blocking vs background dispatch is a first-class caller choice, not
//!   event-loop detection
//! - Transport failures never cross the handler boundary: telemetry must
//!   never break the user's workflow

pub mod handler;
pub mod record;
pub mod transport;

pub use handler::{ApiHandler, DispatchMode, DEFAULT_SERVER_URL};
pub use record::CallRecord;
