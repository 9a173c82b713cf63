//! Configuration file handling for nomad-watch

use anyhow::{Context, Result};
use nomad_client::{ClientConfig, SubscriptionConfig, DEFAULT_ADDRESS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default agent address
    pub address: Option<String>,
    pub region: Option<String>,
    pub namespace: Option<String>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Subscription timings (`[subscriptions]` table)
    pub subscriptions: Option<SubscriptionConfig>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("nomad-watch");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: ConnectionArgs<'_>, no_color: bool) -> MergedConfig {
        let pick = |arg: Option<&str>, file: &Option<String>| {
            arg.map(String::from).or_else(|| file.clone())
        };

        MergedConfig {
            address: pick(args.address, &self.address)
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            region: pick(args.region, &self.region).unwrap_or_default(),
            namespace: pick(args.namespace, &self.namespace).unwrap_or_default(),
            output: self.output.clone(),
            no_color: no_color || self.no_color.unwrap_or(false),
            subscriptions: self.subscriptions.clone().unwrap_or_default(),
        }
    }
}

/// Connection flags given on the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionArgs<'a> {
    pub address: Option<&'a str>,
    pub region: Option<&'a str>,
    pub namespace: Option<&'a str>,
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub address: String,
    pub region: String,
    pub namespace: String,
    /// Output format from the file; the command line wins when given
    pub output: Option<String>,
    pub no_color: bool,
    pub subscriptions: SubscriptionConfig,
}

impl MergedConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::builder(self.address.clone())
            .region(self.region.clone())
            .namespace(self.namespace.clone())
            .subscriptions(self.subscriptions.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_win_over_file() {
        let config: Config = toml::from_str(
            r#"
            address = "http://nomad.internal:4646"
            namespace = "batch"
            output = "json"

            [subscriptions]
            reconnect_interval_ms = 15000
            "#,
        )
        .unwrap();

        let merged = config.merge_with_args(
            ConnectionArgs {
                namespace: Some("prod"),
                ..Default::default()
            },
            false,
        );

        assert_eq!(merged.address, "http://nomad.internal:4646");
        assert_eq!(merged.namespace, "prod");
        assert_eq!(merged.region, "");
        assert_eq!(merged.output.as_deref(), Some("json"));

        let client = merged.client_config();
        assert_eq!(client.subscriptions.reconnect_interval_ms, 15000);
        assert_eq!(client.subscriptions.demand_check_ms, 500);
    }

    #[test]
    fn test_defaults_without_file() {
        let merged = Config::default().merge_with_args(ConnectionArgs::default(), true);
        assert_eq!(merged.address, DEFAULT_ADDRESS);
        assert!(merged.no_color);
    }

    #[test]
    fn test_load_from_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "address = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
