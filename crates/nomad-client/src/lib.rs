//! Nomad Client Library
//!
//! Typed access to a Nomad agent's HTTP API, plus two kinds of live
//! subscriptions:
//!
//! - **Blocking queries**: long-polls a resource and emits a "data" event each
//!   time the server reports a newer `X-Nomad-Index`.
//! - **Event streams**: reads `/v1/event/stream` and emits every event of
//!   every frame, reconnecting on a timer from the last index seen.
//!
//! Subscriptions are demand driven: nothing hits the network until a handler
//! is attached, and work stops once the handlers are gone.
//!
//! # Example
//!
//! ```rust,no_run
//! use nomad_client::{NomadClient, ScaleRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = NomadClient::with_address("http://localhost:4646")?;
//!
//!     // One-shot calls
//!     let jobs = client.jobs().list().await?;
//!     client.jobs().scale("web", &ScaleRequest::new("frontend", 3)).await?;
//!
//!     // Watch a job until it stops
//!     let subscription = client.jobs().get_blocking("web");
//!     subscription.on_data(|job| println!("job changed: {}", job["Status"]));
//!     subscription.on_error(|e| eprintln!("watch failed: {}", e));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides an in-memory transport for timer-driven unit
//! tests and an axum-backed server for integration tests:
//!
//! ```rust,ignore
//! use nomad_client::testing::TestServer;
//!
//! let server = TestServer::start(mock_nomad_router()).await?;
//! let jobs = server.client.jobs().list().await?;
//! ```

mod client;
mod clients;
mod config;
mod error;
mod evaluations;
mod events;
mod jobs;
mod poller;
pub mod stream;
mod subscription;
pub mod testing;
mod transport;
mod types;

pub use client::NomadClient;
pub use clients::Clients;
pub use config::{
    ClientConfig, ClientConfigBuilder, SubscriptionConfig, TimeoutsConfig, DEFAULT_ADDRESS,
};
pub use error::{NomadClientError, Result};
pub use evaluations::Evaluations;
pub use events::{Events, EVENT_STREAM_PATH};
pub use jobs::Jobs;
pub use poller::PollCursor;
pub use subscription::{
    EventKind, EventSink, EventStream, HandlerId, Subscription, SubscriptionEvent,
    SubscriptionMode,
};
pub use transport::{
    ByteStream, HttpTransport, Transport, TransportRequest, TransportResponse, INDEX_HEADER,
};
pub use types::*;

// Re-export stream types for convenience
pub use stream::{EventStreamOptions, FrameDecoder, StreamEvent, TopicFilter, MATCH_ALL};
