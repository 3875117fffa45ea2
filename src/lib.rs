//! Fire-and-forget usage telemetry for dynamically-named functions.
//!
//! Three cooperating subsystems make this work under one process-wide
//! configuration: the [`registry`] decides *whether* a call is tracked,
//! the [`config`] resolver decides *where* its record goes, and the
//! [`dispatch`] handler decides *what* is sent and how delivery failures
//! are absorbed. [`session`] supplies the per-process correlation token
//! and [`intercept`] wraps callables on top of that stable surface.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod intercept;
pub mod registry;
pub mod session;

pub use config::{load_config, ConfigError, ResolvedConfig};
pub use dispatch::{ApiHandler, CallRecord, DispatchMode, DEFAULT_SERVER_URL};
pub use error::{TelemetryError, TransportError};
pub use registry::{Identifier, NamedCallable, ServiceRegistry};
pub use session::SessionId;
