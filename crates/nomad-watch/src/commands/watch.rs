//! Shared loop for commands that follow a subscription

use anyhow::Result;
use futures::StreamExt;
use nomad_client::{Subscription, SubscriptionEvent};

use crate::output::OutputContext;

/// Render every "data" event until Ctrl+C or until the subscription ends
///
/// Errors and connection changes are reported on stderr; the subscription
/// keeps retrying on its own.
pub async fn follow<F>(subscription: Subscription, ctx: &OutputContext, mut render: F) -> Result<()>
where
    F: FnMut(&serde_json::Value) -> Result<()>,
{
    ctx.info("Press Ctrl+C to stop");
    let mut events = subscription.events();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.next() => match event {
                Some(SubscriptionEvent::Data(value)) => render(&value)?,
                Some(SubscriptionEvent::Error(e)) if e.is_transient() => {
                    ctx.warn(&format!("Error (retrying): {}", e))
                }
                Some(SubscriptionEvent::Error(e)) => ctx.warn(&format!("Error: {}", e)),
                Some(SubscriptionEvent::Connected) => ctx.info("Connected"),
                Some(SubscriptionEvent::Disconnected) => {
                    ctx.warn("Disconnected, waiting for the reconnect timer")
                }
                None => {
                    ctx.info("Subscription ended");
                    break;
                }
            },
        }
    }

    drop(events);
    subscription.close();
    ctx.success("Subscription closed");
    Ok(())
}
