//! Document resolution.
//!
//! # Responsibilities
//! - Flatten a nested configuration document into service → endpoint and
//!   service → seeded-identifier mappings
//! - Reject malformed leaves and ambiguous (colliding) service names
//!
//! # Design Decisions
//! - Depth-first traversal in document order; YAML mappings preserve
//!   insertion order, so resolution is deterministic
//! - The slash-joined key path is the endpoint; the same path with '/'
//!   replaced by '_' is the service name, usable as an identifier/key

use std::collections::{HashMap, HashSet};

use serde_yaml::Value;

use crate::config::ConfigError;

/// Separator used to join key paths into endpoint paths.
const PATH_SEPARATOR: char = '/';

/// Replacement character producing service names from endpoint paths.
const NAME_SEPARATOR: char = '_';

/// The two key-aligned mappings derived from one configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Service name → endpoint path (slash-joined, no leading slash).
    pub endpoints: HashMap<String, String>,

    /// Service name → function identifiers tracked from startup.
    pub registry_seed: HashMap<String, HashSet<String>>,
}

impl ResolvedConfig {
    /// Flatten `document` into endpoint and registry-seed mappings.
    ///
    /// The document root must be a mapping (or null, which resolves to
    /// empty mappings). Every leaf must be a sequence of strings; the
    /// chain of keys from the root down to a leaf becomes that leaf's
    /// endpoint path and service name.
    pub fn resolve(document: &Value) -> Result<Self, ConfigError> {
        let mut resolved = ResolvedConfig::default();

        match document {
            Value::Null => Ok(resolved),
            Value::Mapping(_) => {
                let mut path = Vec::new();
                walk(document, &mut path, &mut resolved)?;
                Ok(resolved)
            }
            _ => Err(ConfigError::InvalidNode {
                path: String::new(),
            }),
        }
    }

    /// Service names known to this configuration, sorted for stable output.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.endpoints.keys().cloned().collect();
        names.sort();
        names
    }
}

fn walk(
    node: &Value,
    path: &mut Vec<String>,
    resolved: &mut ResolvedConfig,
) -> Result<(), ConfigError> {
    match node {
        Value::Mapping(children) => {
            for (key, child) in children {
                let key = key.as_str().ok_or_else(|| ConfigError::InvalidNode {
                    path: path.join("/"),
                })?;
                path.push(key.to_string());
                walk(child, path, resolved)?;
                path.pop();
            }
            Ok(())
        }
        Value::Sequence(items) => record_leaf(items, path, resolved),
        _ => Err(ConfigError::InvalidNode {
            path: path.join("/"),
        }),
    }
}

fn record_leaf(
    items: &[Value],
    path: &[String],
    resolved: &mut ResolvedConfig,
) -> Result<(), ConfigError> {
    let endpoint = path.join(&PATH_SEPARATOR.to_string());
    let service = endpoint.replace(PATH_SEPARATOR, &NAME_SEPARATOR.to_string());

    let mut seed = HashSet::with_capacity(items.len());
    for item in items {
        let name = item.as_str().ok_or_else(|| ConfigError::InvalidNode {
            path: endpoint.clone(),
        })?;
        seed.insert(name.to_string());
    }

    // Two paths like `a/b_c` and `a/b/c` collapse to the same service
    // name; silently keeping either one would break the endpoints/registry
    // alignment invariant.
    if let Some(first) = resolved.endpoints.get(&service) {
        return Err(ConfigError::DuplicateService {
            service,
            first: first.clone(),
            second: endpoint,
        });
    }

    resolved.endpoints.insert(service.clone(), endpoint);
    resolved.registry_seed.insert(service, seed);
    Ok(())
}
