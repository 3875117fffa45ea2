//! Function identifiers accepted by the registry.
//!
//! Registration accepts either a plain name or a callable-like handle that
//! exposes one; both resolve to a canonical string at the registry boundary
//! before any set is touched.

use crate::error::TelemetryError;

/// Anything callable-like that can report the name it should be tracked
/// under. Lets hosts register their own function wrappers directly instead
/// of spelling the name out twice.
pub trait NamedCallable {
    /// The identifier this callable is tracked under, e.g. `Experiment.run`.
    fn telemetry_name(&self) -> &str;
}

/// A function identifier on its way into the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Given directly as a name.
    Name(String),
    /// Resolved from a callable handle's name accessor.
    Handle(String),
}

impl Identifier {
    /// Capture the identifier of a callable handle.
    pub fn of(callable: &dyn NamedCallable) -> Self {
        Identifier::Handle(callable.telemetry_name().to_string())
    }

    /// Resolve to the canonical tracked name, validating on the way out.
    /// Identifiers must be non-empty and free of whitespace so they stay
    /// usable as payload values and map keys.
    pub fn canonical(self) -> Result<String, TelemetryError> {
        let name = match self {
            Identifier::Name(name) | Identifier::Handle(name) => name,
        };
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(TelemetryError::InvalidIdentifier(name));
        }
        Ok(name)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::Name(name.to_string())
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::Name(name)
    }
}

impl From<&String> for Identifier {
    fn from(name: &String) -> Self {
        Identifier::Name(name.clone())
    }
}
