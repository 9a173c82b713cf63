//! Request/response and streaming transport
//!
//! Everything the subscription machinery needs from the network goes through
//! the [`Transport`] trait, so pollers and stream readers can run against an
//! in-memory transport in tests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{NomadClientError, Result};

/// Response header carrying the blocking-query cursor
pub const INDEX_HEADER: &str = "x-nomad-index";

/// Raw body chunks of a streaming response, in arrival order
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// A single request issued through a [`Transport`]
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Overrides the transport's default request timeout
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::POST, path)
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.query.extend(params);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// First value of a query parameter, if present
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A fully received response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// 200 response with a JSON body
    pub fn json_ok(body: &serde_json::Value) -> Self {
        Self::new(StatusCode::OK, body.to_string())
    }

    /// Attach a header; invalid names or values are ignored
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    /// Attach the blocking-query index header
    pub fn with_index(self, index: &str) -> Self {
        self.with_header(INDEX_HEADER, index)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The server's cursor for this response
    ///
    /// `None` when the header is missing or not a non-negative integer.
    pub fn index(&self) -> Option<u64> {
        self.headers
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| NomadClientError::ParseError(e.to_string()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn a non-2xx response into a [`NomadClientError::ServerError`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let text = self.text();
        let message = if text.trim().is_empty() {
            format!("HTTP {}", self.status)
        } else {
            text.trim().to_string()
        };
        Err(NomadClientError::server_error(self.status.as_u16(), message))
    }
}

/// The network primitive shared by every client component
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Issue one request and wait for the complete response
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse>;

    /// Open a streaming GET
    ///
    /// Resolves once the server has accepted the request and begun the body.
    /// Dropping the returned stream aborts the connection.
    async fn open_stream(&self, path: &str, query: &[(String, String)]) -> Result<ByteStream>;
}

/// [`Transport`] backed by a `reqwest` connection pool
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    standing: Vec<(String, String)>,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // No client-wide timeout: it would also cut off long-lived streams.
        let client = Client::builder()
            .connect_timeout(config.timeouts.connect())
            .build()?;

        let base_url = Url::parse(&config.address)?;

        Ok(Self {
            client,
            base_url,
            standing: config.standing_params(),
            request_timeout: config.timeouts.request(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(Into::into)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse> {
        let url = self.url(&request.path)?;
        trace!("{} {} {:?}", request.method, url, request.query);

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .query(&self.standing)
            .query(&request.query)
            .timeout(request.timeout.unwrap_or(self.request_timeout));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_send_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_send_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }

    async fn open_stream(&self, path: &str, query: &[(String, String)]) -> Result<ByteStream> {
        let url = self.url(path)?;
        debug!("Opening event stream: {}", url);

        let response = self
            .client
            .get(url)
            .query(&self.standing)
            .query(query)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(NomadClientError::server_error(status, message));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_send_error))
            .boxed())
    }
}

fn map_send_error(e: reqwest::Error) -> NomadClientError {
    if e.is_timeout() {
        NomadClientError::Timeout
    } else if e.is_connect() {
        NomadClientError::ConnectionFailed(e.to_string())
    } else {
        NomadClientError::HttpError(e)
    }
}
