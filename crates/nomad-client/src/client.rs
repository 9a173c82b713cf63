//! Nomad HTTP client
//!
//! [`NomadClient`] owns the configuration and the transport. Resource
//! wrappers borrow it for one-shot calls; subscriptions clone the transport
//! handle and outlive the borrow.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::clients::Clients;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::evaluations::Evaluations;
use crate::events::Events;
use crate::jobs::Jobs;
use crate::poller::BlockingQuery;
use crate::stream::{EventStreamOptions, StreamReader};
use crate::subscription::Subscription;
use crate::transport::{HttpTransport, Transport, TransportRequest};

/// Encode an identifier so it stays a single path segment
///
/// Dispatched job IDs look like `batch/dispatch-1700000000-3f2a`.
pub(crate) fn encode_path_segment(id: &str) -> String {
    id.replace('%', "%25")
        .replace('/', "%2F")
        .replace('?', "%3F")
        .replace('#', "%23")
}

/// Nomad HTTP API client
#[derive(Clone)]
pub struct NomadClient {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl NomadClient {
    /// Create a client over HTTP
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.subscriptions.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client for `address` with default settings
    pub fn with_address(address: impl Into<String>) -> Result<Self> {
        Self::new(ClientConfig::builder(address).build())
    }

    /// Create a client from `NOMAD_ADDR`, `NOMAD_REGION` and `NOMAD_NAMESPACE`
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Create a client over a custom transport
    ///
    /// The transport is responsible for the standing namespace/region
    /// parameters; [`HttpTransport`] takes them from `config`.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    // =========================================================================
    // Resources
    // =========================================================================

    pub fn jobs(&self) -> Jobs<'_> {
        Jobs::new(self)
    }

    pub fn clients(&self) -> Clients<'_> {
        Clients::new(self)
    }

    pub fn evaluations(&self) -> Evaluations<'_> {
        Evaluations::new(self)
    }

    pub fn events(&self) -> Events<'_> {
        Events::new(self)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Watch `path` with blocking queries
    ///
    /// `params` are sent with every request next to the `index` cursor. The
    /// poller stays idle until a "data" or "error" handler is attached.
    /// Must be called from within a tokio runtime.
    pub fn blocking_query(
        &self,
        path: impl Into<String>,
        params: Vec<(String, String)>,
    ) -> Subscription {
        let path = path.into();
        debug!("Blocking query subscription on {}", path);
        BlockingQuery::new(Arc::clone(&self.transport), &self.config, path, params).spawn()
    }

    /// Read the event stream at `path`
    ///
    /// Fails without touching the network when a topic is malformed.
    /// Must be called from within a tokio runtime.
    pub fn stream(
        &self,
        path: impl Into<String>,
        options: EventStreamOptions,
    ) -> Result<Subscription> {
        let reader = StreamReader::new(Arc::clone(&self.transport), &self.config, path, options)?;
        Ok(reader.spawn())
    }

    // =========================================================================
    // One-shot helpers
    // =========================================================================

    #[instrument(skip(self))]
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<T> {
        let request = TransportRequest::get(path).params(params);
        self.transport.request(request).await?.error_for_status()?.json()
    }

    #[instrument(skip(self, body))]
    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let request = TransportRequest::post(path, body);
        self.transport.request(request).await?.error_for_status()?.json()
    }

    #[instrument(skip(self))]
    pub(crate) async fn get_text(&self, path: &str, params: Vec<(String, String)>) -> Result<String> {
        let request = TransportRequest::get(path).params(params);
        Ok(self.transport.request(request).await?.error_for_status()?.text())
    }
}

impl fmt::Debug for NomadClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NomadClient")
            .field("address", &self.config.address)
            .field("region", &self.config.region)
            .field("namespace", &self.config.namespace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NomadClientError;
    use crate::testing::MockTransport;
    use crate::transport::TransportResponse;
    use reqwest::{Method, StatusCode};
    use serde_json::json;

    fn client() -> (NomadClient, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new());
        (
            NomadClient::with_transport(ClientConfig::default(), mock.clone()),
            mock,
        )
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("web"), "web");
        assert_eq!(
            encode_path_segment("batch/dispatch-1-ab"),
            "batch%2Fdispatch-1-ab"
        );
        assert_eq!(encode_path_segment("a?b#c%"), "a%3Fb%23c%25");
    }

    #[test]
    fn test_new_rejects_bad_address() {
        let result = NomadClient::with_address("not a url");
        assert!(matches!(result, Err(NomadClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_new_rejects_zero_periods() {
        let config = ClientConfig::builder("http://localhost:4646")
            .demand_check_ms(0)
            .build();
        assert!(matches!(
            NomadClient::new(config),
            Err(NomadClientError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_get_json_maps_status() {
        let (client, mock) = client();
        mock.push_response(TransportResponse::json_ok(&json!({"ok": true})));
        mock.push_response(TransportResponse::new(StatusCode::NOT_FOUND, "job not found"));

        let value: serde_json::Value = client.get_json("/v1/job/web", Vec::new()).await.unwrap();
        assert_eq!(value["ok"], true);

        match client.get_json::<serde_json::Value>("/v1/job/gone", Vec::new()).await {
            Err(NomadClientError::ServerError { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "job not found");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_post_json_sends_body() {
        let (client, mock) = client();
        mock.push_response(TransportResponse::json_ok(&json!({})));

        let _: serde_json::Value = client
            .post_json("/v1/job/web/scale", json!({"Count": 2}))
            .await
            .unwrap();

        let request = &mock.requests()[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, Some(json!({"Count": 2})));
    }

    #[test]
    fn test_debug_shows_address() {
        let (client, _) = client();
        assert!(format!("{:?}", client).contains("localhost:4646"));
    }
}
