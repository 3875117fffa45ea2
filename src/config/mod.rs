//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML)
//!     → loader.rs (parse into a nested document)
//!     → resolver.rs (flatten into the two key-aligned mappings)
//!     → ResolvedConfig { endpoints, registry_seed }
//!     → seeds the registry identity map and the dispatch handler
//! ```
//!
//! # Design Decisions
//! - Both mappings come out of a single traversal of a single document,
//!   so their service-name key sets cannot drift apart
//! - Resolution fails fast on malformed or ambiguous documents; the
//!   process must not run with an inconsistent endpoints/registry pair
//! - A default document ships embedded in the crate and is resolved once
//!   per process

use std::sync::OnceLock;

pub mod loader;
pub mod resolver;

pub use loader::{load_config, load_document};
pub use resolver::ResolvedConfig;

/// Error type for configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A node that is neither a nested mapping nor a sequence of strings.
    #[error("invalid node at '{path}': expected a nested mapping or a list of strings")]
    InvalidNode { path: String },

    /// Two distinct key paths flattened to the same service name.
    #[error("duplicate service name '{service}': derived from both '{first}' and '{second}'")]
    DuplicateService {
        service: String,
        first: String,
        second: String,
    },
}

/// The configuration document shipped with the crate.
pub const DEFAULT_DOCUMENT: &str = include_str!("default.yaml");

static DEFAULT_CONFIG: OnceLock<ResolvedConfig> = OnceLock::new();

/// The embedded default document, resolved once per process. The registry
/// identity map and the global dispatch handler both seed from this, which
/// keeps their service-name sets aligned.
pub fn default_config() -> &'static ResolvedConfig {
    DEFAULT_CONFIG.get_or_init(|| {
        let document =
            serde_yaml::from_str(DEFAULT_DOCUMENT).expect("embedded default config is valid YAML");
        ResolvedConfig::resolve(&document).expect("embedded default config resolves")
    })
}
