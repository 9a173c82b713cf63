//! Output formatting for nomad-watch (table, json)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format; streaming commands print one document per line
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.green());
        }
    }

    /// Print a status line (unless in quiet mode)
    ///
    /// Goes to stderr so JSON on stdout stays machine readable.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    println!("{}", Table::new(data));
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
        }
    }

    /// Print key-value pairs
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Table => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
    }

    /// Print a raw JSON document on one line
    pub fn print_json_line(&self, value: &serde_json::Value) {
        println!("{}", value);
    }
}

pub fn format_json_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Job display for jobs command
#[derive(Debug, Tabled, Serialize)]
pub struct JobRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Type")]
    pub job_type: String,
    #[tabled(rename = "Priority")]
    pub priority: i32,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Modify Index")]
    pub modify_index: u64,
}

impl From<nomad_client::JobListStub> for JobRow {
    fn from(job: nomad_client::JobListStub) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type,
            priority: job.priority,
            status: colorize_status(&job.status),
            modify_index: job.modify_index,
        }
    }
}

/// Allocation display for allocs command
#[derive(Debug, Tabled, Serialize)]
pub struct AllocationRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Job")]
    pub job_id: String,
    #[tabled(rename = "Task Group")]
    pub task_group: String,
    #[tabled(rename = "Node")]
    pub node_name: String,
    #[tabled(rename = "Desired")]
    pub desired_status: String,
    #[tabled(rename = "Status")]
    pub client_status: String,
}

impl From<nomad_client::AllocationListStub> for AllocationRow {
    fn from(alloc: nomad_client::AllocationListStub) -> Self {
        Self {
            id: short_id(&alloc.id),
            job_id: alloc.job_id,
            task_group: alloc.task_group,
            node_name: alloc.node_name,
            desired_status: alloc.desired_status,
            client_status: colorize_status(&alloc.client_status),
        }
    }
}

/// Task group display for job command
#[derive(Debug, Tabled, Serialize)]
pub struct TaskGroupRow {
    #[tabled(rename = "Task Group")]
    pub name: String,
    #[tabled(rename = "Count")]
    pub count: i64,
}

/// First 8 characters of a UUID, like the nomad CLI shows them
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn colorize_status(status: &str) -> String {
    match status {
        "running" | "complete" | "successful" => status.green().to_string(),
        "pending" | "queued" => status.yellow().to_string(),
        "dead" | "failed" | "lost" => status.red().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("5b1c6c0e-0f3a-4e1d"), "5b1c6c0e");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_format_json_value() {
        assert_eq!(format_json_value(&json!("web")), "web");
        assert_eq!(format_json_value(&json!(3)), "3");
        assert_eq!(format_json_value(&json!(null)), "");
    }

    #[test]
    fn test_output_format_from_config_string() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("TABLE".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert!("csv".parse::<OutputFormat>().is_err());
    }
}
