//! Scale command - change a task group's count

use anyhow::Result;
use nomad_client::{NomadClient, ScaleRequest};

use crate::output::OutputContext;

pub async fn scale(
    client: &NomadClient,
    job_id: &str,
    group: &str,
    count: i64,
    message: Option<&str>,
    ctx: &OutputContext,
) -> Result<()> {
    let mut request = ScaleRequest::new(group, count);
    if let Some(message) = message {
        request = request.message(message);
    }

    let response = client.jobs().scale(job_id, &request).await?;

    ctx.success(&format!("Scaled {}/{} to {}", job_id, group, count));
    ctx.print_kv(&[
        ("Evaluation", response.eval_id),
        ("Job Modify Index", response.job_modify_index.to_string()),
        ("Warnings", response.warnings),
    ]);
    Ok(())
}
