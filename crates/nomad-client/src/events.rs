//! Event stream endpoint

use crate::client::NomadClient;
use crate::error::Result;
use crate::stream::EventStreamOptions;
use crate::subscription::Subscription;

/// Path of the cluster event stream
pub const EVENT_STREAM_PATH: &str = "/v1/event/stream";

/// Event stream access, obtained through [`NomadClient::events`]
#[derive(Debug, Clone, Copy)]
pub struct Events<'a> {
    client: &'a NomadClient,
}

impl<'a> Events<'a> {
    pub(crate) fn new(client: &'a NomadClient) -> Self {
        Self { client }
    }

    /// Subscribe to cluster events
    ///
    /// Topic filters are checked here; a malformed one fails immediately.
    /// The connection opens in the background right away, so a "connected"
    /// event may fire before a handler for it is attached; use
    /// [`Subscription::is_connected`] to read the current state.
    pub fn stream(&self, options: EventStreamOptions) -> Result<Subscription> {
        self.client.stream(EVENT_STREAM_PATH, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::stream::TopicFilter;
    use crate::testing::MockTransport;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_stream_opens_event_path() {
        let mock = Arc::new(MockTransport::new());
        let _body = mock.push_stream();
        let client = NomadClient::with_transport(ClientConfig::default(), mock.clone());

        let sub = client
            .events()
            .stream(EventStreamOptions::new().topic(TopicFilter::new("Node")))
            .unwrap();
        sub.on_data(|_| {});
        tokio::time::sleep(Duration::from_millis(10)).await;

        let opens = mock.stream_opens();
        assert_eq!(opens.len(), 1);
        assert_eq!(opens[0].0, EVENT_STREAM_PATH);
        assert!(opens[0]
            .1
            .contains(&("topic".to_string(), "Node:*".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_subscriber_sees_connected_state() {
        let mock = Arc::new(MockTransport::new());
        let body = mock.push_stream();
        let client = NomadClient::with_transport(ClientConfig::default(), mock.clone());

        let sub = client.events().stream(EventStreamOptions::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        // "connected" already fired with nobody listening
        assert!(sub.is_connected());
        sub.on_data(|_| {});

        body.close();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!sub.is_connected());
        assert!(sub.is_active());
    }
}
