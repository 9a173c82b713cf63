//! Event stream subscriptions
//!
//! Reads the cluster event stream, a single chunked response carrying JSON
//! frames of the form `{"Index": n, "Events": [...]}`. Every element of
//! `Events` is delivered as its own "data" event.
//!
//! # Example
//!
//! ```no_run
//! use nomad_client::{EventStreamOptions, NomadClient, StreamEvent, TopicFilter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = NomadClient::from_env()?;
//!
//! let subscription = client.events().stream(
//!     EventStreamOptions::new()
//!         .topic(TopicFilter::new("Job").with_filter("web"))
//!         .topic(TopicFilter::new("Allocation")),
//! )?;
//!
//! subscription.on_data(|value| {
//!     if let Ok(event) = StreamEvent::from_value(value) {
//!         println!("{} {} @ {}", event.topic, event.event_type, event.index);
//!     }
//! });
//!
//! // Explicit cleanup (also happens on drop)
//! subscription.close();
//! # Ok(())
//! # }
//! ```

mod decoder;
mod reader;
mod types;

pub use decoder::FrameDecoder;
pub(crate) use reader::StreamReader;
pub use types::{EventStreamOptions, StreamEvent, TopicFilter, MATCH_ALL};
