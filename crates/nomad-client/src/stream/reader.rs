//! Event stream reader
//!
//! Keeps one streaming connection open on a best-effort basis:
//!
//! ```text
//!   Disconnected ──reconnect tick──▶ Connecting ──opened──▶ Connected
//!        ▲                               │                     │
//!        └──────── open failed ──────────┘      end / error ───┘
//! ```
//!
//! Recovery only happens on the reconnect tick, never immediately after a
//! failure. An open still pending when the next tick arrives is abandoned
//! and started over. A separate demand tick tears the reader down once no "data"
//! handler is left.

use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::StreamExt;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::decoder::FrameDecoder;
use super::types::{EventStreamOptions, TopicFilter};
use crate::config::ClientConfig;
use crate::error::{NomadClientError, Result};
use crate::subscription::{
    EventKind, EventSink, Subscription, SubscriptionEvent, SubscriptionMode, SubscriptionShared,
};
use crate::transport::{ByteStream, Transport};

/// The reader's single connection slot
enum Connection {
    Disconnected,
    Connecting(BoxFuture<'static, Result<ByteStream>>),
    Connected(ByteStream),
}

enum Activity {
    Opened(Result<ByteStream>),
    Chunk(Option<Result<Bytes>>),
}

enum Step {
    Cancelled,
    Reconnect,
    DemandCheck,
    Activity(Activity),
}

impl Connection {
    fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting(_))
    }

    /// Wait for whatever the current connection does next
    ///
    /// Cancel-safe: a pending open or read stays in place when dropped.
    async fn next_activity(&mut self) -> Activity {
        match self {
            Self::Disconnected => std::future::pending().await,
            Self::Connecting(open) => Activity::Opened(open.await),
            Self::Connected(stream) => Activity::Chunk(stream.next().await),
        }
    }
}

/// A configured, not yet running, event stream reader
pub(crate) struct StreamReader {
    transport: Arc<dyn Transport>,
    path: String,
    topics: Vec<TopicFilter>,
    start_index: u64,
    reconnect_interval: Duration,
    demand_poll: Duration,
    max_buffer_bytes: Option<usize>,
}

impl StreamReader {
    /// Validate the options; bad topics or timings fail here, before any I/O
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
        path: impl Into<String>,
        options: EventStreamOptions,
    ) -> Result<Self> {
        options.validate()?;
        config.subscriptions.validate()?;

        Ok(Self {
            transport,
            path: path.into(),
            topics: options.topics,
            start_index: options.index.unwrap_or(0),
            reconnect_interval: config.subscriptions.reconnect_interval(),
            demand_poll: config.subscriptions.demand_poll(),
            max_buffer_bytes: config.subscriptions.max_buffer_bytes,
        })
    }

    /// Query for a connection resuming at `index`
    pub(crate) fn query(&self, index: u64) -> Vec<(String, String)> {
        std::iter::once(("index".to_string(), index.to_string()))
            .chain(
                self.topics
                    .iter()
                    .map(|topic| ("topic".to_string(), topic.to_param())),
            )
            .collect()
    }

    /// Start connecting in the background and hand back the subscription
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(self) -> Subscription {
        let shared = Arc::new(SubscriptionShared::new(Some(self.start_index)));
        let sink = Arc::downgrade(&shared);
        let cancel = shared.cancel_token();
        let path = self.path.clone();

        tokio::spawn(self.run(sink, cancel));

        Subscription::new(shared, path, SubscriptionMode::EventStream)
    }

    fn open(&self, index: u64) -> BoxFuture<'static, Result<ByteStream>> {
        let transport = Arc::clone(&self.transport);
        let path = self.path.clone();
        let query = self.query(index);
        debug!("Connecting to {} at index {}", path, index);

        Box::pin(async move { transport.open_stream(&path, &query).await })
    }

    async fn run(self, sink: Weak<SubscriptionShared>, cancel: CancellationToken) {
        let mut decoder = FrameDecoder::with_limit(self.max_buffer_bytes);
        let mut connection = Connection::Disconnected;

        // First tick fires immediately and opens the initial connection.
        let mut reconnect = tokio::time::interval(self.reconnect_interval);
        reconnect.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut demand =
            tokio::time::interval_at(Instant::now() + self.demand_poll, self.demand_poll);
        demand.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => Step::Cancelled,
                _ = reconnect.tick() => Step::Reconnect,
                _ = demand.tick() => Step::DemandCheck,
                activity = connection.next_activity() => Step::Activity(activity),
            };

            match step {
                Step::Cancelled => break,

                Step::Reconnect => {
                    if connection.is_connected() {
                        trace!("Reconnect tick: connection still live");
                        continue;
                    }
                    let Some(shared) = sink.upgrade() else { break };
                    if connection.is_connecting() {
                        // Opens only start on a tick, so this one had a full period
                        warn!("Open of {} did not complete, retrying", self.path);
                        connection = Connection::Disconnected;
                        shared.emit(SubscriptionEvent::error(NomadClientError::Timeout));
                    }
                    let index = shared.resume_index().unwrap_or(self.start_index);
                    drop(shared);
                    connection = Connection::Connecting(self.open(index));
                }

                Step::DemandCheck => {
                    let Some(shared) = sink.upgrade() else { break };
                    if shared.demand(EventKind::Data) > 0 {
                        continue;
                    }
                    debug!("No data handlers left on {}, tearing down", self.path);
                    if connection.is_connected() {
                        shared.emit(SubscriptionEvent::Disconnected);
                    }
                    shared.shutdown();
                    break;
                }

                Step::Activity(Activity::Opened(Ok(stream))) => {
                    decoder.reset();
                    connection = Connection::Connected(stream);
                    debug!("Connected to {}", self.path);
                    let Some(shared) = sink.upgrade() else { break };
                    shared.emit(SubscriptionEvent::Connected);
                }

                Step::Activity(Activity::Opened(Err(e))) => {
                    connection = Connection::Disconnected;
                    warn!("Failed to connect to {}: {}", self.path, e);
                    let Some(shared) = sink.upgrade() else { break };
                    shared.emit(SubscriptionEvent::error(e));
                }

                Step::Activity(Activity::Chunk(Some(Ok(chunk)))) => {
                    let Some(shared) = sink.upgrade() else { break };
                    match decoder.feed(&chunk) {
                        Ok(events) => {
                            for event in events {
                                shared.emit(SubscriptionEvent::Data(event));
                            }
                        }
                        Err(e) => {
                            warn!("Dropping connection to {}: {}", self.path, e);
                            connection = Connection::Disconnected;
                            shared.emit(SubscriptionEvent::error(e));
                            shared.emit(SubscriptionEvent::Disconnected);
                        }
                    }
                }

                Step::Activity(Activity::Chunk(Some(Err(e)))) => {
                    connection = Connection::Disconnected;
                    warn!("Stream {} failed: {}", self.path, e);
                    let Some(shared) = sink.upgrade() else { break };
                    shared.emit(SubscriptionEvent::error(e));
                    shared.emit(SubscriptionEvent::Disconnected);
                }

                Step::Activity(Activity::Chunk(None)) => {
                    connection = Connection::Disconnected;
                    debug!("Stream {} closed by server", self.path);
                    let Some(shared) = sink.upgrade() else { break };
                    shared.emit(SubscriptionEvent::Disconnected);
                }
            }
        }

        debug!("Event stream reader stopped: {}", self.path);
    }
}
