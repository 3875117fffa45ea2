//! Registry entries and the process-wide identity map.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock, RwLock};

use dashmap::DashMap;

use crate::config;
use crate::error::TelemetryError;
use crate::registry::identifier::Identifier;

static REGISTRIES: OnceLock<DashMap<String, Arc<ServiceRegistry>>> = OnceLock::new();

fn registries() -> &'static DashMap<String, Arc<ServiceRegistry>> {
    REGISTRIES.get_or_init(DashMap::new)
}

/// The set of tracked function identifiers for one service.
#[derive(Debug)]
pub struct ServiceRegistry {
    service: String,
    tracked: RwLock<HashSet<String>>,
}

impl ServiceRegistry {
    fn new(service: String, seed: HashSet<String>) -> Self {
        Self {
            service,
            tracked: RwLock::new(seed),
        }
    }

    /// The entry for `service`, created on first reference.
    ///
    /// Creation runs under the identity map's entry lock, so concurrent
    /// first access yields exactly one entry. New entries are seeded from
    /// the default resolved configuration; service names the configuration
    /// does not know start empty (legitimate ad-hoc services).
    pub fn for_service(service: impl Into<String>) -> Arc<ServiceRegistry> {
        let service = service.into();
        registries()
            .entry(service.clone())
            .or_insert_with(|| {
                let seed = config::default_config()
                    .registry_seed
                    .get(&service)
                    .cloned()
                    .unwrap_or_default();
                Arc::new(ServiceRegistry::new(service, seed))
            })
            .clone()
    }

    /// Drop every entry for every service. Test harness use only; the
    /// production flow never destroys entries.
    pub fn reset_all() {
        registries().clear();
    }

    /// The service name this entry belongs to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Add identifiers to the tracked set.
    ///
    /// Every identifier is validated before the set is touched, so a bad
    /// argument mutates nothing. Registering an already-tracked identifier
    /// is an idempotent no-op that logs a warning: accidental double
    /// registration should be visible without being fatal.
    pub fn register<I>(&self, identifiers: I) -> Result<(), TelemetryError>
    where
        I: IntoIterator,
        I::Item: Into<Identifier>,
    {
        let names = canonicalize(identifiers)?;
        let mut tracked = self.tracked.write().unwrap();
        for name in names {
            if !tracked.insert(name.clone()) {
                tracing::warn!(
                    service = %self.service,
                    identifier = %name,
                    "identifier already registered"
                );
            }
        }
        Ok(())
    }

    /// Remove identifiers from the tracked set.
    ///
    /// Validates every identifier and checks that all of them are present
    /// before removing any, so a failed call leaves the set unchanged.
    pub fn deregister<I>(&self, identifiers: I) -> Result<(), TelemetryError>
    where
        I: IntoIterator,
        I::Item: Into<Identifier>,
    {
        let names = canonicalize(identifiers)?;
        let mut tracked = self.tracked.write().unwrap();
        for name in &names {
            if !tracked.contains(name) {
                return Err(TelemetryError::NotRegistered {
                    service: self.service.clone(),
                    identifier: name.clone(),
                });
            }
        }
        for name in &names {
            tracked.remove(name);
        }
        Ok(())
    }

    /// Whether calls to `name` should be tracked.
    pub fn contains(&self, name: &str) -> bool {
        self.tracked.read().unwrap().contains(name)
    }

    /// Snapshot of the tracked identifiers. Order is not significant.
    pub fn tracked(&self) -> Vec<String> {
        self.tracked.read().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tracked.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.read().unwrap().is_empty()
    }
}

/// Resolve and validate a batch of identifiers up front (all-or-nothing).
fn canonicalize<I>(identifiers: I) -> Result<Vec<String>, TelemetryError>
where
    I: IntoIterator,
    I::Item: Into<Identifier>,
{
    identifiers
        .into_iter()
        .map(|id| id.into().canonical())
        .collect()
}
