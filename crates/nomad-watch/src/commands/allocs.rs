//! Allocs command - allocations created by an evaluation

use anyhow::Result;
use nomad_client::NomadClient;

use crate::output::{AllocationRow, OutputContext};

pub async fn allocs(client: &NomadClient, eval_id: &str, ctx: &OutputContext) -> Result<()> {
    let allocs = client.evaluations().allocations(eval_id).await?;

    let rows: Vec<AllocationRow> = allocs.into_iter().map(AllocationRow::from).collect();
    ctx.print(&rows);
    Ok(())
}
