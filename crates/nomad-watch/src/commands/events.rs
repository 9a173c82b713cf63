//! Events command - follow the cluster event stream

use anyhow::{Context, Result};
use nomad_client::{EventStreamOptions, NomadClient, StreamEvent, TopicFilter};

use super::watch::follow;
use crate::output::{OutputContext, OutputFormat};

pub async fn events(
    client: &NomadClient,
    topics: &[String],
    index: Option<u64>,
    ctx: &OutputContext,
) -> Result<()> {
    let mut options = EventStreamOptions::new();
    for topic in topics {
        let topic: TopicFilter = topic
            .parse()
            .with_context(|| format!("Invalid topic {:?}", topic))?;
        options = options.topic(topic);
    }
    if let Some(index) = index {
        options = options.index(index);
    }

    let subscription = client.events().stream(options)?;
    follow(subscription, ctx, |value| {
        match ctx.format {
            OutputFormat::Json => ctx.print_json_line(value),
            OutputFormat::Table => match StreamEvent::from_value(value) {
                Ok(event) => println!("{}", format_event(&event)),
                Err(_) => ctx.print_json_line(value),
            },
        }
        Ok(())
    })
    .await
}

fn format_event(event: &StreamEvent) -> String {
    format!(
        "[{}] {} {} {}",
        event.index, event.topic, event.event_type, event.key
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_event() {
        let event = StreamEvent::from_value(&json!({
            "Topic": "Allocation",
            "Type": "AllocationUpdated",
            "Key": "5b1c",
            "Index": 88,
            "Payload": {}
        }))
        .unwrap();

        assert_eq!(format_event(&event), "[88] Allocation AllocationUpdated 5b1c");
    }
}
