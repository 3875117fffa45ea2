//! The process-wide dispatch handler.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use url::Url;

use crate::config::{self, ResolvedConfig};
use crate::dispatch::record::{self, CallRecord};
use crate::dispatch::transport;
use crate::error::{TelemetryError, TransportError};

/// Where telemetry goes unless the host configures otherwise.
pub const DEFAULT_SERVER_URL: &str = "https://tracking-services-d6c2fd311c12.herokuapp.com";

/// Upper bound on any single delivery attempt, in either mode.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static GLOBAL: OnceLock<ApiHandler> = OnceLock::new();

/// How a send should relate to the caller's control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Wait for the delivery attempt to finish before returning.
    Blocking,
    /// Schedule the delivery and return immediately.
    Background,
}

/// Process-wide store of delivery configuration, and the object that
/// builds and sends telemetry payloads.
///
/// One logical instance exists per process, reached through
/// [`ApiHandler::global`]; configuration changes made through any
/// reference take effect for all subsequent sends from any caller.
/// Isolated instances can be built with [`ApiHandler::with_config`] for
/// tests and embedding hosts that manage their own lifecycle.
pub struct ApiHandler {
    server_url: ArcSwap<String>,
    endpoints: RwLock<HashMap<String, String>>,
    extra_fields: RwLock<HashMap<String, Map<String, Value>>>,
    pop_fields: RwLock<HashMap<String, Vec<String>>>,
    client: reqwest::Client,
}

impl ApiHandler {
    /// The process-wide handler, lazily initialized from the embedded
    /// default configuration.
    pub fn global() -> &'static ApiHandler {
        GLOBAL.get_or_init(|| {
            ApiHandler::with_config(config::default_config().clone(), DEFAULT_SERVER_URL)
        })
    }

    /// Build an isolated handler from an already-resolved configuration.
    pub fn with_config(resolved: ResolvedConfig, server_url: &str) -> Self {
        Self::with_config_and_timeout(resolved, server_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// As [`ApiHandler::with_config`], with an explicit request timeout.
    pub fn with_config_and_timeout(
        resolved: ResolvedConfig,
        server_url: &str,
        timeout: Duration,
    ) -> Self {
        let extra_fields = resolved
            .endpoints
            .keys()
            .map(|service| (service.clone(), Map::new()))
            .collect();

        Self {
            server_url: ArcSwap::from_pointee(server_url.to_string()),
            endpoints: RwLock::new(resolved.endpoints),
            extra_fields: RwLock::new(extra_fields),
            pop_fields: RwLock::new(HashMap::new()),
            client: transport::build_client(timeout),
        }
    }

    /// The base URL all endpoint paths hang off.
    pub fn server_url(&self) -> String {
        self.server_url.load().as_ref().clone()
    }

    /// Override the base URL for all subsequent sends, from any caller.
    pub fn set_server_url(&self, url: &str) -> Result<(), TelemetryError> {
        Url::parse(url).map_err(|source| TelemetryError::InvalidServerUrl {
            url: url.to_string(),
            source,
        })?;
        self.server_url
            .store(Arc::new(url.trim_end_matches('/').to_string()));
        Ok(())
    }

    /// Snapshot of the service → endpoint mapping.
    pub fn endpoints(&self) -> HashMap<String, String> {
        self.endpoints.read().unwrap().clone()
    }

    /// Replace the endpoint mapping wholesale, re-aligning the per-service
    /// field configuration: retained services keep their extra/pop fields,
    /// new services start empty, removed services are dropped.
    pub fn replace_endpoints(&self, endpoints: HashMap<String, String>) {
        let mut current = self.endpoints.write().unwrap();
        let mut extra = self.extra_fields.write().unwrap();
        let mut pops = self.pop_fields.write().unwrap();

        extra.retain(|service, _| endpoints.contains_key(service));
        pops.retain(|service, _| endpoints.contains_key(service));
        for service in endpoints.keys() {
            extra.entry(service.clone()).or_default();
        }
        *current = endpoints;
    }

    fn ensure_known(&self, service: &str) -> Result<(), TelemetryError> {
        if self.endpoints.read().unwrap().contains_key(service) {
            Ok(())
        } else {
            Err(TelemetryError::UnknownService(service.to_string()))
        }
    }

    /// Merge `fields` into the extra fields sent with every record for
    /// `service`.
    pub fn add_extra_fields(
        &self,
        service: &str,
        fields: Map<String, Value>,
    ) -> Result<(), TelemetryError> {
        self.ensure_known(service)?;
        let mut extra = self.extra_fields.write().unwrap();
        let entry = extra.entry(service.to_string()).or_default();
        for (key, value) in fields {
            entry.insert(key, value);
        }
        Ok(())
    }

    /// Remove named keys from `service`'s extra fields. Unknown keys are
    /// ignored.
    pub fn delete_extra_fields(
        &self,
        service: &str,
        keys: &[impl AsRef<str>],
    ) -> Result<(), TelemetryError> {
        self.ensure_known(service)?;
        let mut extra = self.extra_fields.write().unwrap();
        if let Some(entry) = extra.get_mut(service) {
            for key in keys {
                entry.remove(key.as_ref());
            }
        }
        Ok(())
    }

    /// Snapshot of `service`'s extra fields.
    pub fn extra_fields(&self, service: &str) -> Result<Map<String, Value>, TelemetryError> {
        self.ensure_known(service)?;
        Ok(self
            .extra_fields
            .read()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default())
    }

    /// Add payload keys to remove from every record for `service`, e.g.
    /// suppressing session tracking for CLI use.
    pub fn add_pop_fields(
        &self,
        service: &str,
        fields: &[impl AsRef<str>],
    ) -> Result<(), TelemetryError> {
        self.ensure_known(service)?;
        let mut pops = self.pop_fields.write().unwrap();
        let entry = pops.entry(service.to_string()).or_default();
        for field in fields {
            let field = field.as_ref();
            if !entry.iter().any(|f| f == field) {
                entry.push(field.to_string());
            }
        }
        Ok(())
    }

    /// Remove names from `service`'s pop-field list. Unknown names are
    /// ignored.
    pub fn delete_pop_fields(
        &self,
        service: &str,
        fields: &[impl AsRef<str>],
    ) -> Result<(), TelemetryError> {
        self.ensure_known(service)?;
        let mut pops = self.pop_fields.write().unwrap();
        if let Some(entry) = pops.get_mut(service) {
            entry.retain(|f| !fields.iter().any(|removed| removed.as_ref() == f));
        }
        Ok(())
    }

    /// Snapshot of `service`'s pop fields.
    pub fn pop_fields(&self, service: &str) -> Result<Vec<String>, TelemetryError> {
        self.ensure_known(service)?;
        Ok(self
            .pop_fields
            .read()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default())
    }

    /// Build the payload that `send` would deliver for `record`, without
    /// sending it.
    pub fn prepare_payload(
        &self,
        service: &str,
        record: &CallRecord,
    ) -> Result<Map<String, Value>, TelemetryError> {
        Ok(self.prepare(service, record)?.1)
    }

    /// Validate the service, resolve the URL and assemble the payload.
    /// Snapshots are cloned out of the locks so no lock is held across the
    /// network call.
    fn prepare(
        &self,
        service: &str,
        record: &CallRecord,
    ) -> Result<(String, Map<String, Value>), TelemetryError> {
        let endpoint = self
            .endpoints
            .read()
            .unwrap()
            .get(service)
            .cloned()
            .ok_or_else(|| TelemetryError::UnknownService(service.to_string()))?;

        let extra = self
            .extra_fields
            .read()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default();
        let pops = self
            .pop_fields
            .read()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default();

        let url = transport::join_url(&self.server_url(), &endpoint);
        let payload = record::build_payload(service, record, &extra, &pops);
        Ok((url, payload))
    }

    /// Send one record and wait for the delivery attempt to finish.
    ///
    /// An unknown service is an error; a transport failure is not. The
    /// failure is logged and the call still returns `Ok(())`: telemetry
    /// must never abort the instrumented call.
    pub async fn send(&self, service: &str, record: CallRecord) -> Result<(), TelemetryError> {
        let (url, payload) = self.prepare(service, &record)?;
        log_outcome(service, &url, transport::deliver(&self.client, &url, &payload).await);
        Ok(())
    }

    /// Send one record without making the caller wait.
    ///
    /// The delivery runs as a detached task; there is no cancellation
    /// handle, and a record still in flight at process exit is lost.
    /// Outside a tokio runtime the send falls back to blocking, with a
    /// warning, rather than dropping the record.
    pub fn send_background(&self, service: &str, record: CallRecord) -> Result<(), TelemetryError> {
        let (url, payload) = self.prepare(service, &record)?;
        let client = self.client.clone();
        let service = service.to_string();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    log_outcome(&service, &url, transport::deliver(&client, &url, &payload).await);
                });
            }
            Err(_) => {
                tracing::warn!(service = %service, "no async runtime running, telemetry will block");
                block_on_delivery(&service, &client, &url, &payload);
            }
        }
        Ok(())
    }

    /// Mode-parameterized dispatch for synchronous callers.
    ///
    /// Async callers wanting blocking semantics should `send(...).await`
    /// instead; a synchronous blocking dispatch issued from inside a
    /// runtime worker cannot block without risking deadlock, so it is
    /// demoted to a background task, with a warning.
    pub fn dispatch(
        &self,
        service: &str,
        record: CallRecord,
        mode: DispatchMode,
    ) -> Result<(), TelemetryError> {
        match mode {
            DispatchMode::Background => self.send_background(service, record),
            DispatchMode::Blocking => {
                if tokio::runtime::Handle::try_current().is_ok() {
                    tracing::warn!(
                        service,
                        "blocking dispatch inside an async runtime would deadlock, sending in background"
                    );
                    return self.send_background(service, record);
                }
                let (url, payload) = self.prepare(service, &record)?;
                block_on_delivery(service, &self.client, &url, &payload);
                Ok(())
            }
        }
    }
}

/// Drive one delivery to completion on a throwaway current-thread runtime.
fn block_on_delivery(
    service: &str,
    client: &reqwest::Client,
    url: &str,
    payload: &Map<String, Value>,
) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    match runtime {
        Ok(runtime) => {
            log_outcome(
                service,
                url,
                runtime.block_on(transport::deliver(client, url, payload)),
            );
        }
        Err(error) => {
            tracing::warn!(service, %error, "could not build runtime for blocking telemetry send");
        }
    }
}

fn log_outcome(service: &str, url: &str, outcome: Result<(), TransportError>) {
    match outcome {
        Ok(()) => tracing::debug!(service, url, "telemetry posted"),
        Err(error) => tracing::warn!(service, url, %error, "telemetry delivery failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handler() -> ApiHandler {
        let document: serde_yaml::Value = serde_yaml::from_str(
            r#"
            payu:
              run:
                - Experiment.run
            intake:
              catalog:
                - DfFileCatalog.search
            "#,
        )
        .unwrap();
        let resolved = ResolvedConfig::resolve(&document).unwrap();
        ApiHandler::with_config(resolved, "http://localhost:8000")
    }

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_extra_fields_start_empty_per_service() {
        let handler = handler();
        assert!(handler.extra_fields("payu_run").unwrap().is_empty());
        assert!(handler.extra_fields("intake_catalog").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_service_is_an_error_everywhere() {
        let handler = handler();
        let unknown = "payu_restart";

        assert!(matches!(
            handler.add_extra_fields(unknown, Map::new()),
            Err(TelemetryError::UnknownService(_))
        ));
        assert!(matches!(
            handler.delete_extra_fields(unknown, &["x"]),
            Err(TelemetryError::UnknownService(_))
        ));
        assert!(matches!(
            handler.add_pop_fields(unknown, &["x"]),
            Err(TelemetryError::UnknownService(_))
        ));
        assert!(matches!(
            handler.delete_pop_fields(unknown, &["x"]),
            Err(TelemetryError::UnknownService(_))
        ));
        assert!(matches!(
            handler.prepare_payload(unknown, &CallRecord::new("f", vec![], Map::new())),
            Err(TelemetryError::UnknownService(_))
        ));
    }

    #[test]
    fn test_add_extra_fields_merges() {
        let handler = handler();
        handler
            .add_extra_fields("payu_run", fields(&[("model", json!("ACCESS-OM2"))]))
            .unwrap();
        handler
            .add_extra_fields("payu_run", fields(&[("random_number", json!(2))]))
            .unwrap();

        let extra = handler.extra_fields("payu_run").unwrap();
        assert_eq!(extra["model"], json!("ACCESS-OM2"));
        assert_eq!(extra["random_number"], json!(2));

        // Other services are untouched.
        assert!(handler.extra_fields("intake_catalog").unwrap().is_empty());
    }

    #[test]
    fn test_delete_extra_fields_is_idempotent() {
        let handler = handler();
        handler
            .add_extra_fields("payu_run", fields(&[("model", json!("ACCESS-OM2"))]))
            .unwrap();

        handler
            .delete_extra_fields("payu_run", &["model", "never_there"])
            .unwrap();
        assert!(handler.extra_fields("payu_run").unwrap().is_empty());

        // Deleting again is fine.
        handler.delete_extra_fields("payu_run", &["model"]).unwrap();
    }

    #[test]
    fn test_pop_fields_roundtrip() {
        let handler = handler();
        handler
            .add_pop_fields("payu_run", &["session_id", "name"])
            .unwrap();
        handler.add_pop_fields("payu_run", &["session_id"]).unwrap();

        assert_eq!(
            handler.pop_fields("payu_run").unwrap(),
            vec!["session_id", "name"]
        );

        handler.delete_pop_fields("payu_run", &["name"]).unwrap();
        assert_eq!(handler.pop_fields("payu_run").unwrap(), vec!["session_id"]);
    }

    #[test]
    fn test_payload_shaping_is_per_service() {
        let handler = handler();
        handler
            .add_extra_fields("payu_run", fields(&[("a", json!(1))]))
            .unwrap();
        handler.add_pop_fields("payu_run", &["session_id"]).unwrap();
        handler
            .add_extra_fields("intake_catalog", fields(&[("unrelated", json!(true))]))
            .unwrap();

        let record = CallRecord::new("Experiment.run", vec![], Map::new());
        let payload = handler.prepare_payload("payu_run", &record).unwrap();

        assert_eq!(payload["a"], json!(1));
        assert!(!payload.contains_key("session_id"));
        assert!(!payload.contains_key("unrelated"));
    }

    #[test]
    fn test_set_server_url_validates() {
        let handler = handler();
        assert!(matches!(
            handler.set_server_url("not a url"),
            Err(TelemetryError::InvalidServerUrl { .. })
        ));

        handler.set_server_url("http://localhost:9999/").unwrap();
        assert_eq!(handler.server_url(), "http://localhost:9999");
    }

    #[test]
    fn test_replace_endpoints_realigns_field_config() {
        let handler = handler();
        handler
            .add_extra_fields("payu_run", fields(&[("keep", json!(1))]))
            .unwrap();
        handler.add_pop_fields("intake_catalog", &["name"]).unwrap();

        let mut endpoints = HashMap::new();
        endpoints.insert("payu_run".to_string(), "payu/run".to_string());
        endpoints.insert("fresh_service".to_string(), "fresh/service".to_string());
        handler.replace_endpoints(endpoints);

        // Retained service keeps its fields, new service starts empty,
        // removed service is gone.
        assert_eq!(handler.extra_fields("payu_run").unwrap()["keep"], json!(1));
        assert!(handler.extra_fields("fresh_service").unwrap().is_empty());
        assert!(matches!(
            handler.extra_fields("intake_catalog"),
            Err(TelemetryError::UnknownService(_))
        ));
    }

    #[test]
    fn test_unknown_service_error_before_any_mutation() {
        let handler = handler();
        let err = handler
            .add_extra_fields("ghost", fields(&[("a", json!(1))]))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::UnknownService(ref s) if s == "ghost"));

        // No state appeared for the misspelled service.
        assert!(matches!(
            handler.extra_fields("ghost"),
            Err(TelemetryError::UnknownService(_))
        ));
    }
}
