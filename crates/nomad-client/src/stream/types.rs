//! Types for event stream subscriptions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NomadClientError, Result};

/// Filter key matching every event of a topic
pub const MATCH_ALL: &str = "*";

/// One `topic=<name>:<filter>` entry of an event stream request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFilter {
    /// Topic name, e.g. `Job`, `Allocation`, `Deployment`, or `*`
    pub topic: String,

    /// Filter key (job ID, node ID, ...); `*` when unset
    #[serde(default)]
    pub filter: Option<String>,
}

impl TopicFilter {
    /// Every event of `topic`
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Filter key, defaulting to match-all
    pub fn filter(&self) -> &str {
        self.filter.as_deref().unwrap_or(MATCH_ALL)
    }

    /// Query value in `name:filter` form
    pub fn to_param(&self) -> String {
        format!("{}:{}", self.topic, self.filter())
    }

    pub fn validate(&self) -> Result<()> {
        if self.topic.is_empty() {
            return Err(NomadClientError::InvalidTopic("empty topic name".into()));
        }
        if self.topic.contains(':') || self.topic.chars().any(char::is_whitespace) {
            return Err(NomadClientError::InvalidTopic(format!(
                "topic name {:?} must not contain ':' or whitespace",
                self.topic
            )));
        }
        if let Some(filter) = &self.filter {
            if filter.is_empty() || filter.chars().any(char::is_whitespace) {
                return Err(NomadClientError::InvalidTopic(format!(
                    "filter {:?} for topic {} must be non-empty without whitespace",
                    filter, self.topic
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param())
    }
}

impl FromStr for TopicFilter {
    type Err = NomadClientError;

    /// Parse `Job`, `Job:*` or `Job:example`
    fn from_str(s: &str) -> Result<Self> {
        let parsed = match s.split_once(':') {
            Some((topic, filter)) => TopicFilter::new(topic).with_filter(filter),
            None => TopicFilter::new(s),
        };
        parsed.validate()?;
        Ok(parsed)
    }
}

/// Options for [`crate::NomadClient::stream`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStreamOptions {
    /// Topics to receive; the server sends every topic when empty
    #[serde(default)]
    pub topics: Vec<TopicFilter>,

    /// Index to resume from (0 when unset)
    #[serde(default)]
    pub index: Option<u64>,
}

impl EventStreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(mut self, topic: TopicFilter) -> Self {
        self.topics.push(topic);
        self
    }

    pub fn index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.topics.iter().try_for_each(TopicFilter::validate)
    }
}

/// A single event as delivered in a frame's `Events` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamEvent {
    pub topic: String,

    #[serde(rename = "Type")]
    pub event_type: String,

    pub key: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub filter_keys: Option<Vec<String>>,

    pub index: u64,

    #[serde(default)]
    pub payload: serde_json::Value,
}

impl StreamEvent {
    /// Decode a "data" payload emitted by an event stream subscription
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| NomadClientError::ParseError(e.to_string()))
    }

    /// Get a payload object (e.g. `Job`, `Allocation`) as a specific type
    pub fn get<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.payload
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Check if a payload object is present
    pub fn has(&self, name: &str) -> bool {
        self.payload.get(name).is_some()
    }
}
