//! nomad-watch - Command-line tool for watching and driving a Nomad cluster
//!
//! One-shot commands print a snapshot; `--watch` and `events` follow live
//! changes through blocking queries and the event stream until Ctrl+C.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nomad_client::{LogType, NomadClient};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, ConnectionArgs};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "nomad-watch")]
#[command(author, version, about = "Watch and drive a Nomad cluster")]
#[command(propagate_version = true)]
struct Cli {
    /// Agent HTTP address
    #[arg(short, long, env = "NOMAD_ADDR")]
    address: Option<String>,

    /// Region sent with every request
    #[arg(long, env = "NOMAD_REGION")]
    region: Option<String>,

    /// Namespace sent with every request
    #[arg(short, long, env = "NOMAD_NAMESPACE")]
    namespace: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "NOMAD_WATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List jobs
    Jobs {
        /// Only jobs whose ID starts with this prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Keep printing the list each time it changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Show job details
    Job {
        /// Job ID
        id: String,

        /// Keep printing the job each time it changes
        #[arg(short, long)]
        watch: bool,
    },

    /// List allocations created by an evaluation
    Allocs {
        /// Evaluation ID
        eval: String,
    },

    /// Print a task's log from an allocation
    Logs {
        /// Allocation ID
        alloc: String,

        /// Task name
        #[arg(short, long)]
        task: String,

        /// Log to read: stdout or stderr
        #[arg(long = "type", default_value = "stdout")]
        log_type: LogType,
    },

    /// Dispatch a parameterized job
    Dispatch {
        /// Parameterized job ID
        job: String,

        /// Payload as a string
        #[arg(long)]
        payload: Option<String>,

        /// Payload read from a file
        #[arg(long)]
        payload_file: Option<PathBuf>,

        /// Metadata entry as key=value (repeatable)
        #[arg(long)]
        meta: Vec<String>,
    },

    /// Change the count of a task group
    Scale {
        /// Job ID
        job: String,

        /// Task group name
        group: String,

        /// New count
        count: i64,

        /// Reason recorded with the scaling event
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Follow the cluster event stream
    Events {
        /// Topic as Name or Name:filter (repeatable; default all topics)
        #[arg(short, long)]
        topic: Vec<String>,

        /// Start from this index
        #[arg(long)]
        index: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose otherwise selects debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(
        ConnectionArgs {
            address: cli.address.as_deref(),
            region: cli.region.as_deref(),
            namespace: cli.namespace.as_deref(),
        },
        cli.no_color,
    );

    let format = match (cli.output, merged.output.as_deref()) {
        (Some(format), _) => format,
        (None, Some(name)) => name
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Invalid output format in config file")?,
        (None, None) => OutputFormat::default(),
    };

    // Create output context
    let ctx = OutputContext::new(format, merged.no_color, cli.quiet);

    debug!(
        "Agent {} (region {:?}, namespace {:?})",
        merged.address, merged.region, merged.namespace
    );
    let client =
        NomadClient::new(merged.client_config()).context("Failed to create Nomad client")?;

    // Execute command
    match &cli.command {
        Commands::Jobs { prefix, watch } => {
            commands::jobs(&client, prefix.as_deref(), *watch, &ctx).await?;
        }

        Commands::Job { id, watch } => {
            commands::job(&client, id, *watch, &ctx).await?;
        }

        Commands::Allocs { eval } => {
            commands::allocs(&client, eval, &ctx).await?;
        }

        Commands::Logs {
            alloc,
            task,
            log_type,
        } => {
            commands::logs(&client, alloc, task, *log_type, &ctx).await?;
        }

        Commands::Dispatch {
            job,
            payload,
            payload_file,
            meta,
        } => {
            commands::dispatch(
                &client,
                job,
                payload.as_deref(),
                payload_file.as_deref(),
                meta,
                &ctx,
            )
            .await?;
        }

        Commands::Scale {
            job,
            group,
            count,
            message,
        } => {
            commands::scale(&client, job, group, *count, message.as_deref(), &ctx).await?;
        }

        Commands::Events { topic, index } => {
            commands::events(&client, topic, *index, &ctx).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_events_topics() {
        let cli = Cli::try_parse_from([
            "nomad-watch",
            "--namespace",
            "batch",
            "events",
            "--topic",
            "Job:web",
            "--topic",
            "Allocation",
            "--index",
            "42",
        ])
        .unwrap();

        assert_eq!(cli.namespace.as_deref(), Some("batch"));
        match cli.command {
            Commands::Events { topic, index } => {
                assert_eq!(topic, vec!["Job:web", "Allocation"]);
                assert_eq!(index, Some(42));
            }
            _ => panic!("expected events command"),
        }
    }

    #[test]
    fn test_parse_logs_type() {
        let cli = Cli::try_parse_from([
            "nomad-watch", "logs", "5b1c", "--task", "api", "--type", "stderr",
        ])
        .unwrap();

        match cli.command {
            Commands::Logs { log_type, .. } => assert_eq!(log_type, LogType::Stderr),
            _ => panic!("expected logs command"),
        }
    }
}
