//! Per-service function registries.
//!
//! # Responsibilities
//! - One registry entry per service name, shared process-wide
//! - Track/untrack function identifiers with validation and duplicate
//!   warnings
//! - Answer the interceptor's "should this call be tracked?" query
//!
//! # Design Decisions
//! - Identity map keyed by service name, not a single global singleton:
//!   different services need independent membership sets
//! - Entries are created lazily on first reference and seeded from the
//!   default resolved configuration

pub mod entry;
pub mod identifier;

pub use entry::ServiceRegistry;
pub use identifier::{Identifier, NamedCallable};
