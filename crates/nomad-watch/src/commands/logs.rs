//! Logs command - print a task's log

use anyhow::{Context, Result};
use nomad_client::{LogOptions, LogType, NomadClient};

use crate::output::OutputContext;

pub async fn logs(
    client: &NomadClient,
    alloc_id: &str,
    task: &str,
    log_type: LogType,
    ctx: &OutputContext,
) -> Result<()> {
    let options = LogOptions::new(task).log_type(log_type);
    let text = client
        .clients()
        .logs(alloc_id, &options)
        .await
        .with_context(|| format!("Failed to read {} of {}", log_type.as_str(), task))?;

    if text.is_empty() {
        ctx.info("(empty log)");
    } else {
        print!("{}", text);
    }
    Ok(())
}
