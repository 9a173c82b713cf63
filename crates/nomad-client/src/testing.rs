//! Test utilities for nomad-client
//!
//! [`MockTransport`] scripts responses and streams in memory so subscription
//! timing can be tested under a paused clock. [`TestServer`] runs an axum
//! router on a local port for end-to-end tests over real HTTP.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::stream::StreamExt;
use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::config::{ClientConfig, ClientConfigBuilder};
use crate::error::{NomadClientError, Result};
use crate::transport::{ByteStream, Transport, TransportRequest, TransportResponse};
use crate::NomadClient;

// =============================================================================
// MockTransport
// =============================================================================

#[derive(Default)]
struct MockState {
    responses: VecDeque<Result<TransportResponse>>,
    requests: Vec<TransportRequest>,
    streams: VecDeque<ScriptedOpen>,
    stream_opens: Vec<(String, Vec<(String, String)>)>,
}

enum ScriptedOpen {
    Ready(Result<ByteStream>),
    /// Server accepted the connection but never answers
    Hang,
}

/// In-memory [`Transport`] with scripted answers
///
/// Requests take the next scripted response in order. Once the script is
/// exhausted a request behaves like a long poll the server is holding open:
/// it stays pending until [`MockTransport::release_pending`] is called, then
/// answers `200 null` without an index.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
    pending: AtomicUsize,
    release: Notify,
}

/// Decrements the pending count when a held request finishes or is dropped
struct PendingGuard<'a>(&'a AtomicUsize);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: TransportResponse) {
        self.state.lock().responses.push_back(Ok(response));
    }

    pub fn push_error(&self, error: NomadClientError) {
        self.state.lock().responses.push_back(Err(error));
    }

    /// Number of requests issued so far, answered or not
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests currently held open
    pub fn pending_requests(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Answer every held request with `200 null`
    pub fn release_pending(&self) {
        self.release.notify_waiters();
    }

    /// Script the next stream open to succeed; the handle feeds its body
    pub fn push_stream(&self) -> MockStream {
        let (tx, rx) = mpsc::unbounded();
        self.state
            .lock()
            .streams
            .push_back(ScriptedOpen::Ready(Ok(rx.boxed())));
        MockStream { tx }
    }

    pub fn push_stream_error(&self, error: NomadClientError) {
        self.state
            .lock()
            .streams
            .push_back(ScriptedOpen::Ready(Err(error)));
    }

    /// Script the next stream open to never resolve
    pub fn push_stream_hang(&self) {
        self.state.lock().streams.push_back(ScriptedOpen::Hang);
    }

    pub fn stream_open_count(&self) -> usize {
        self.state.lock().stream_opens.len()
    }

    /// Path and query of every stream open, in order
    pub fn stream_opens(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.state.lock().stream_opens.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse> {
        let scripted = {
            let mut state = self.state.lock();
            state.requests.push(request);
            state.responses.pop_front()
        };
        if let Some(response) = scripted {
            return response;
        }

        let released = self.release.notified();
        self.pending.fetch_add(1, Ordering::SeqCst);
        let _guard = PendingGuard(&self.pending);
        released.await;

        Ok(TransportResponse::new(StatusCode::OK, "null"))
    }

    async fn open_stream(&self, path: &str, query: &[(String, String)]) -> Result<ByteStream> {
        let scripted = {
            let mut state = self.state.lock();
            state
                .stream_opens
                .push((path.to_string(), query.to_vec()));
            state.streams.pop_front()
        };
        match scripted {
            Some(ScriptedOpen::Ready(result)) => result,
            Some(ScriptedOpen::Hang) => std::future::pending().await,
            None => Err(NomadClientError::ConnectionFailed(
                "no stream scripted".into(),
            )),
        }
    }
}

/// Sending side of a scripted stream body
pub struct MockStream {
    tx: mpsc::UnboundedSender<Result<Bytes>>,
}

impl MockStream {
    /// Deliver one chunk
    pub fn send(&self, chunk: &str) {
        self.send_bytes(Bytes::copy_from_slice(chunk.as_bytes()));
    }

    pub fn send_bytes(&self, chunk: Bytes) {
        let _ = self.tx.unbounded_send(Ok(chunk));
    }

    /// Fail the stream with a transport error
    pub fn fail(&self, error: NomadClientError) {
        let _ = self.tx.unbounded_send(Err(error));
    }

    /// End the body as if the server closed the connection
    pub fn close(self) {
        self.tx.close_channel();
    }

    /// Whether the reader dropped its end of the connection
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// =============================================================================
// TestServer
// =============================================================================

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: NomadClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` on a free local port with a client pointed at it
    ///
    /// # Example
    ///
    /// ```ignore
    /// use axum::{routing::get, Json, Router};
    /// use nomad_client::testing::TestServer;
    ///
    /// let router = Router::new().route("/v1/jobs", get(|| async { Json(vec![()]) }));
    /// let server = TestServer::start(router).await?;
    /// let jobs = server.client.jobs().list().await?;
    /// ```
    pub async fn start(router: axum::Router) -> Result<Self> {
        Self::start_with(router, |builder| builder).await
    }

    /// Like [`TestServer::start`], with a hook to adjust the client config
    pub async fn start_with<F>(router: axum::Router, configure: F) -> Result<Self>
    where
        F: FnOnce(ClientConfigBuilder) -> ClientConfigBuilder,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| NomadClientError::ConnectionFailed(e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| NomadClientError::ConnectionFailed(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        let config: ClientConfig =
            configure(ClientConfig::builder(format!("http://{}", addr))).build();
        let client = NomadClient::new(config)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> &NomadClient {
        &self.client
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
