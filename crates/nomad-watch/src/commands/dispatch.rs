//! Dispatch command - start an instance of a parameterized job

use anyhow::{bail, Context, Result};
use nomad_client::{DispatchRequest, NomadClient};
use std::path::Path;

use crate::output::OutputContext;

pub async fn dispatch(
    client: &NomadClient,
    job_id: &str,
    payload: Option<&str>,
    payload_file: Option<&Path>,
    meta: &[String],
    ctx: &OutputContext,
) -> Result<()> {
    let mut request = DispatchRequest::new();

    match (payload, payload_file) {
        (Some(_), Some(_)) => bail!("Use either --payload or --payload-file, not both"),
        (Some(text), None) => request = request.payload(text),
        (None, Some(path)) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read payload file: {}", path.display()))?;
            request = request.payload(bytes);
        }
        (None, None) => {}
    }

    for (key, value) in parse_meta(meta)? {
        request = request.meta(key, value);
    }

    let response = client.jobs().dispatch(job_id, &request).await?;

    ctx.success(&format!("Dispatched {}", response.dispatched_job_id));
    ctx.print_kv(&[
        ("Dispatched Job", response.dispatched_job_id),
        ("Evaluation", response.eval_id),
        ("Index", response.index.to_string()),
    ]);
    Ok(())
}

/// Parse `key=value` pairs
fn parse_meta(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("Invalid meta entry {:?}, expected key=value", pair),
        })
        .collect()
}
