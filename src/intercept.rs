//! Explicit call wrapping.
//!
//! # Responsibilities
//! - Implement the interceptor contract on top of the stable core API:
//!   registry membership check, dispatch, session identity
//! - Keep telemetry strictly out of the wrapped call's result path
//!
//! # Design Decisions
//! - A higher-order function, not instrumentation magic: hosts wrap the
//!   callables they care about and pick the dispatch mode explicitly
//! - Even caller-visible dispatch errors (an unknown service) are logged
//!   rather than surfaced here, because the wrapper runs inside someone
//!   else's call

use serde_json::{Map, Value};

use crate::dispatch::{ApiHandler, CallRecord, DispatchMode};
use crate::registry::ServiceRegistry;

/// Invoke `f`, and if `function` is tracked for `service`, dispatch one
/// telemetry record for the call afterwards. Returns whatever `f` returns.
pub fn track_call<R>(
    service: &str,
    function: &str,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
    mode: DispatchMode,
    f: impl FnOnce() -> R,
) -> R {
    let tracked = ServiceRegistry::for_service(service).contains(function);
    let result = f();

    if tracked {
        let record = CallRecord::new(function, args, kwargs);
        if let Err(error) = ApiHandler::global().dispatch(service, record, mode) {
            tracing::warn!(service, function, %error, "telemetry dispatch refused");
        }
    }
    result
}

/// Async variant of [`track_call`] for hosts already running on a runtime;
/// the record is sent with blocking semantics (awaited) after `f`
/// completes.
pub async fn track_call_async<R, Fut>(
    service: &str,
    function: &str,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
    f: impl FnOnce() -> Fut,
) -> R
where
    Fut: std::future::Future<Output = R>,
{
    let tracked = ServiceRegistry::for_service(service).contains(function);
    let result = f().await;

    if tracked {
        let record = CallRecord::new(function, args, kwargs);
        if let Err(error) = ApiHandler::global().send(service, record).await {
            tracing::warn!(service, function, %error, "telemetry dispatch refused");
        }
    }
    result
}

/// Register `function` for `service`, then behave as [`track_call`].
/// Mirrors decorating a function at definition site: the first wrapped
/// call makes the identifier tracked from then on.
pub fn register_and_track<R>(
    service: &str,
    function: &str,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
    mode: DispatchMode,
    f: impl FnOnce() -> R,
) -> R {
    if let Err(error) = ServiceRegistry::for_service(service).register([function]) {
        tracing::warn!(service, function, %error, "could not register function for telemetry");
    }
    track_call(service, function, args, kwargs, mode, f)
}
