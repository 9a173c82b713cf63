//! Client configuration with YAML support
//!
//! Standing parameters (`namespace`, `region`) are fixed once a client is
//! built and are attached to every request that client issues.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{NomadClientError, Result};

/// Default agent address when neither configuration nor environment sets one
pub const DEFAULT_ADDRESS: &str = "http://localhost:4646";

/// Nomad client configuration
///
/// Can be loaded from YAML, JSON, the `NOMAD_*` environment variables, or
/// constructed programmatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Agent HTTP address
    #[serde(default = "default_address")]
    pub address: String,

    /// Region applied to every request (empty = agent default)
    #[serde(default)]
    pub region: String,

    /// Namespace applied to every request (empty = agent default)
    #[serde(default)]
    pub namespace: String,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Subscription timing settings
    #[serde(default)]
    pub subscriptions: SubscriptionConfig,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            region: String::new(),
            namespace: String::new(),
            timeouts: TimeoutsConfig::default(),
            subscriptions: SubscriptionConfig::default(),
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// One-shot request timeout in milliseconds (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Blocking query timeout in milliseconds (default: 330s)
    ///
    /// Must exceed the server-side maximum wait of five minutes, otherwise
    /// every quiet long poll surfaces as a timeout.
    #[serde(default = "default_blocking_timeout")]
    pub blocking_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_timeout(),
            connect_ms: default_connect_timeout(),
            blocking_ms: default_blocking_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_blocking_timeout() -> u64 {
    330_000 // 5.5 minutes
}

impl TimeoutsConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn blocking(&self) -> Duration {
        Duration::from_millis(self.blocking_ms)
    }
}

/// Timing knobs for blocking-query and event-stream subscriptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Poller: recheck interval while no handler is attached (default: 500ms)
    #[serde(default = "default_demand_check")]
    pub demand_check_ms: u64,

    /// Poller: delay after a failed request (default: 5s)
    #[serde(default = "default_error_backoff")]
    pub error_backoff_ms: u64,

    /// Stream reader: reconnect timer period (default: 60s)
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,

    /// Stream reader: zero-demand teardown check period (default: 1s)
    #[serde(default = "default_demand_poll")]
    pub demand_poll_ms: u64,

    /// Stream reader: drop the connection once this many unparsed bytes are
    /// buffered (default: unlimited)
    #[serde(default)]
    pub max_buffer_bytes: Option<usize>,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            demand_check_ms: default_demand_check(),
            error_backoff_ms: default_error_backoff(),
            reconnect_interval_ms: default_reconnect_interval(),
            demand_poll_ms: default_demand_poll(),
            max_buffer_bytes: None,
        }
    }
}

fn default_demand_check() -> u64 {
    500 // 500ms
}

fn default_error_backoff() -> u64 {
    5_000 // 5 seconds
}

fn default_reconnect_interval() -> u64 {
    60_000 // 1 minute
}

fn default_demand_poll() -> u64 {
    1_000 // 1 second
}

impl SubscriptionConfig {
    pub fn demand_check(&self) -> Duration {
        Duration::from_millis(self.demand_check_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn demand_poll(&self) -> Duration {
        Duration::from_millis(self.demand_poll_ms)
    }

    /// Reject zero periods, which would turn the timers into busy loops
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("demand_check_ms", self.demand_check_ms),
            ("reconnect_interval_ms", self.reconnect_interval_ms),
            ("demand_poll_ms", self.demand_poll_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(NomadClientError::ConfigError(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        if self.max_buffer_bytes == Some(0) {
            return Err(NomadClientError::ConfigError(
                "max_buffer_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl ClientConfig {
    /// Build a configuration from `NOMAD_ADDR`, `NOMAD_REGION` and
    /// `NOMAD_NAMESPACE`, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            address: non_empty("NOMAD_ADDR").unwrap_or_else(default_address),
            region: non_empty("NOMAD_REGION").unwrap_or_default(),
            namespace: non_empty("NOMAD_NAMESPACE").unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            NomadClientError::ConfigError(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| NomadClientError::ConfigError(e.to_string()))
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| NomadClientError::ConfigError(e.to_string()))
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| NomadClientError::ConfigError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder(address: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(address)
    }

    /// Standing query parameters attached to every request
    ///
    /// Empty values are left out so the agent applies its own defaults.
    pub fn standing_params(&self) -> Vec<(String, String)> {
        [("namespace", &self.namespace), ("region", &self.region)]
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }
}

/// Builder for ClientConfig
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with the given agent address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                address: address.into(),
                ..ClientConfig::default()
            },
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Set request timeout in milliseconds
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.request_ms = ms;
        self
    }

    /// Set blocking query timeout in milliseconds
    pub fn blocking_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.blocking_ms = ms;
        self
    }

    /// Replace all subscription timings at once
    pub fn subscriptions(mut self, subscriptions: SubscriptionConfig) -> Self {
        self.config.subscriptions = subscriptions;
        self
    }

    pub fn demand_check_ms(mut self, ms: u64) -> Self {
        self.config.subscriptions.demand_check_ms = ms;
        self
    }

    pub fn error_backoff_ms(mut self, ms: u64) -> Self {
        self.config.subscriptions.error_backoff_ms = ms;
        self
    }

    pub fn reconnect_interval_ms(mut self, ms: u64) -> Self {
        self.config.subscriptions.reconnect_interval_ms = ms;
        self
    }

    pub fn demand_poll_ms(mut self, ms: u64) -> Self {
        self.config.subscriptions.demand_poll_ms = ms;
        self
    }

    pub fn max_buffer_bytes(mut self, limit: usize) -> Self {
        self.config.subscriptions.max_buffer_bytes = Some(limit);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
address: "http://nomad.service:4646"
region: "eu-west"
namespace: "batch"

timeouts:
  request_ms: 5000

subscriptions:
  error_backoff_ms: 250
  max_buffer_bytes: 1048576
"#;

        let config = ClientConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.address, "http://nomad.service:4646");
        assert_eq!(config.region, "eu-west");
        assert_eq!(config.namespace, "batch");
        assert_eq!(config.timeouts.request_ms, 5000);
        assert_eq!(config.timeouts.connect_ms, 10_000);
        assert_eq!(config.subscriptions.error_backoff_ms, 250);
        assert_eq!(config.subscriptions.demand_check_ms, 500);
        assert_eq!(config.subscriptions.max_buffer_bytes, Some(1_048_576));
    }

    #[test]
    fn test_defaults_match_protocol_timings() {
        let subs = SubscriptionConfig::default();
        assert_eq!(subs.demand_check(), Duration::from_millis(500));
        assert_eq!(subs.error_backoff(), Duration::from_secs(5));
        assert_eq!(subs.reconnect_interval(), Duration::from_secs(60));
        assert_eq!(subs.demand_poll(), Duration::from_secs(1));
        assert!(subs.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("NOMAD_ADDR", "http://10.0.0.5:4646"),
            ("NOMAD_NAMESPACE", "web"),
            ("NOMAD_REGION", ""),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.address, "http://10.0.0.5:4646");
        assert_eq!(config.namespace, "web");
        assert_eq!(config.region, "");

        let empty = ClientConfig::from_lookup(|_| None);
        assert_eq!(empty.address, DEFAULT_ADDRESS);
    }

    #[test]
    fn test_standing_params_skip_empty() {
        let config = ClientConfig::builder(DEFAULT_ADDRESS)
            .namespace("default")
            .build();
        assert_eq!(
            config.standing_params(),
            vec![("namespace".to_string(), "default".to_string())]
        );

        let both = ClientConfig::builder(DEFAULT_ADDRESS)
            .namespace("ops")
            .region("global")
            .build();
        assert_eq!(both.standing_params().len(), 2);
    }

    #[test]
    fn test_validate_rejects_zero_periods() {
        let config = ClientConfig::builder(DEFAULT_ADDRESS)
            .demand_poll_ms(0)
            .build();
        assert!(config.subscriptions.validate().is_err());
    }

    #[test]
    fn test_to_yaml() {
        let config = ClientConfig::builder("http://localhost:4646")
            .region("global")
            .build();

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("address"));
        assert!(yaml.contains("global"));
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nomad.yaml");
        std::fs::write(&path, "address: http://nomad.service:4646\nnamespace: batch\n").unwrap();

        let config = ClientConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.address, "http://nomad.service:4646");
        assert_eq!(config.namespace, "batch");

        let missing = ClientConfig::from_yaml_file(dir.path().join("absent.yaml"));
        assert!(matches!(missing, Err(NomadClientError::ConfigError(_))));
    }
}
