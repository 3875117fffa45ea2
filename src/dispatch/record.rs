//! Telemetry payload assembly.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::session::{self, SessionId};

/// Payload keys written by the handler itself. Extra fields may shadow
/// these, but doing so is logged.
const RESERVED_KEYS: [&str; 6] = ["timestamp", "name", "function", "args", "kwargs", "session_id"];

/// Context captured from one tracked call.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub function: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub session_id: String,
}

impl CallRecord {
    /// Build a record for the current session.
    pub fn new(function: impl Into<String>, args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self {
            function: function.into(),
            args,
            kwargs,
            session_id: SessionId::current().to_string(),
        }
    }

    /// Same record with an explicit session id. Callers that want the
    /// field gone entirely configure a pop field instead.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }
}

/// Assemble the JSON body for one record: reserved fields, then the
/// service's extra fields (extra wins on collision, loudly), then drop the
/// service's pop fields.
pub(crate) fn build_payload(
    service: &str,
    record: &CallRecord,
    extra_fields: &Map<String, Value>,
    pop_fields: &[String],
) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
    payload.insert("name".into(), Value::String(session::login_name()));
    payload.insert("function".into(), Value::String(record.function.clone()));
    payload.insert("args".into(), Value::Array(record.args.clone()));
    payload.insert("kwargs".into(), Value::Object(record.kwargs.clone()));
    payload.insert(
        "session_id".into(),
        Value::String(record.session_id.clone()),
    );

    for (key, value) in extra_fields {
        if RESERVED_KEYS.contains(&key.as_str()) {
            tracing::warn!(
                service,
                field = %key,
                "extra field shadows a reserved payload field"
            );
        }
        payload.insert(key.clone(), value.clone());
    }

    for field in pop_fields {
        payload.remove(field);
    }

    payload
}
