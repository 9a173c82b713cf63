//! Blocking-query poller
//!
//! Runs the long-poll protocol for one path: send the last index seen, wait
//! for the server to answer, emit only when the index moved forward.
//!
//! ```text
//!   Idle ──handler attached──▶ Polling ──settled──▶ Polling | Idle
//!    ▲                                                   │
//!    └────────────── no "data"/"error" handlers ─────────┘
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ClientConfig;
use crate::error::{NomadClientError, Result};
use crate::subscription::{
    EventKind, EventSink, Subscription, SubscriptionEvent, SubscriptionMode, SubscriptionShared,
};
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Last index a poller has emitted for
///
/// Only moves forward, and only past the value it already holds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollCursor(u64);

impl PollCursor {
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Advance to `index` if it is strictly greater; returns whether it moved
    pub fn advance(&mut self, index: Option<u64>) -> bool {
        match index {
            Some(index) if index > self.0 => {
                self.0 = index;
                true
            }
            _ => false,
        }
    }
}

/// What a single settled request means for the caller
#[derive(Debug)]
pub(crate) enum PollOutcome {
    /// New state past the cursor
    Snapshot(serde_json::Value),
    /// Server answered without advancing (timeout of the wait, or a bogus index)
    Unchanged,
    Failed(NomadClientError),
}

/// Classify one response and move the cursor accordingly
pub(crate) fn settle(cursor: &mut PollCursor, result: Result<TransportResponse>) -> PollOutcome {
    let response = match result.and_then(TransportResponse::error_for_status) {
        Ok(response) => response,
        Err(e) => return PollOutcome::Failed(e),
    };

    let index = match response.index() {
        Some(index) if index > cursor.value() => index,
        other => {
            trace!("No change (index {:?}, cursor {})", other, cursor.value());
            return PollOutcome::Unchanged;
        }
    };

    // Cursor moves only once the body is usable, so a bad body is retried.
    match response.json::<serde_json::Value>() {
        Ok(body) => {
            cursor.advance(Some(index));
            PollOutcome::Snapshot(body)
        }
        Err(e) => PollOutcome::Failed(e),
    }
}

/// A configured, not yet running, blocking query
pub(crate) struct BlockingQuery {
    transport: Arc<dyn Transport>,
    path: String,
    params: Vec<(String, String)>,
    request_timeout: Duration,
    demand_check: Duration,
    error_backoff: Duration,
}

impl BlockingQuery {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
        path: impl Into<String>,
        params: Vec<(String, String)>,
    ) -> Self {
        Self {
            transport,
            path: path.into(),
            params,
            request_timeout: config.timeouts.blocking(),
            demand_check: config.subscriptions.demand_check(),
            error_backoff: config.subscriptions.error_backoff(),
        }
    }

    /// Start the poll loop in the background and hand back its subscription
    ///
    /// Must be called from within a tokio runtime. No request is issued until
    /// a "data" or "error" handler is attached.
    pub(crate) fn spawn(self) -> Subscription {
        let shared = Arc::new(SubscriptionShared::new(None));
        let sink = Arc::downgrade(&shared);
        let cancel = shared.cancel_token();
        let path = self.path.clone();

        tokio::spawn(self.run(sink, cancel));

        Subscription::new(shared, path, SubscriptionMode::BlockingQuery)
    }

    async fn run(self, sink: Weak<SubscriptionShared>, cancel: CancellationToken) {
        let mut cursor = PollCursor::default();
        debug!("Blocking query started: {}", self.path);

        loop {
            let wanted = match sink.upgrade() {
                Some(shared) => {
                    shared.demand(EventKind::Data) + shared.demand(EventKind::Error) > 0
                }
                None => break,
            };

            if !wanted {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.demand_check) => continue,
                }
            }

            let request = TransportRequest::get(self.path.as_str())
                .params(self.params.iter().cloned())
                .query("index", cursor.value().to_string())
                .timeout(self.request_timeout);

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.transport.request(request) => result,
            };

            match settle(&mut cursor, result) {
                PollOutcome::Snapshot(body) => {
                    debug!("{} advanced to index {}", self.path, cursor.value());
                    match sink.upgrade() {
                        Some(shared) => shared.emit(SubscriptionEvent::Data(body)),
                        None => break,
                    }
                }
                PollOutcome::Unchanged => {}
                PollOutcome::Failed(e) => {
                    warn!("Blocking query on {} failed: {}", self.path, e);
                    match sink.upgrade() {
                        Some(shared) => shared.emit(SubscriptionEvent::error(e)),
                        None => break,
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }

        debug!("Blocking query stopped: {}", self.path);
    }
}
