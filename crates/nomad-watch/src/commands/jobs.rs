//! Jobs commands - list and inspect jobs

use anyhow::{Context, Result};
use nomad_client::{Job, JobListOptions, JobListStub, NomadClient};

use super::watch::follow;
use crate::output::{format_json_value, JobRow, OutputContext, OutputFormat, TaskGroupRow};

/// List jobs, optionally following changes
pub async fn jobs(
    client: &NomadClient,
    prefix: Option<&str>,
    watch: bool,
    ctx: &OutputContext,
) -> Result<()> {
    let options = JobListOptions {
        prefix: prefix.map(String::from),
    };

    if !watch {
        let jobs = client.jobs().list_with(&options).await?;
        print_jobs(jobs, ctx);
        return Ok(());
    }

    let subscription = client.jobs().list_blocking_with(&options);
    follow(subscription, ctx, |value| {
        if ctx.format == OutputFormat::Json {
            ctx.print_json_line(value);
            return Ok(());
        }
        let jobs: Vec<JobListStub> =
            serde_json::from_value(value.clone()).context("Unexpected job list")?;
        print_jobs(jobs, ctx);
        Ok(())
    })
    .await
}

fn print_jobs(jobs: Vec<JobListStub>, ctx: &OutputContext) {
    let rows: Vec<JobRow> = jobs.into_iter().map(JobRow::from).collect();
    ctx.print(&rows);
}

/// Show one job, optionally following changes
pub async fn job(client: &NomadClient, job_id: &str, watch: bool, ctx: &OutputContext) -> Result<()> {
    if !watch {
        let job = client
            .jobs()
            .get(job_id)
            .await
            .with_context(|| format!("Failed to fetch job {}", job_id))?;
        print_job(&job, ctx);
        return Ok(());
    }

    let subscription = client.jobs().get_blocking(job_id);
    follow(subscription, ctx, |value| {
        if ctx.format == OutputFormat::Json {
            ctx.print_json_line(value);
            return Ok(());
        }
        let job: Job = serde_json::from_value(value.clone()).context("Unexpected job document")?;
        print_job(&job, ctx);
        Ok(())
    })
    .await
}

fn print_job(job: &Job, ctx: &OutputContext) {
    let datacenters = job
        .extra
        .get("Datacenters")
        .map(format_json_value)
        .unwrap_or_default();

    ctx.print_kv(&[
        ("ID", job.id.clone()),
        ("Name", job.name.clone()),
        ("Namespace", job.namespace.clone()),
        ("Type", job.job_type.clone()),
        ("Status", job.status.clone()),
        ("Stop", job.stop.to_string()),
        ("Version", job.version.to_string()),
        ("Datacenters", datacenters),
        ("Modify Index", job.modify_index.to_string()),
    ]);

    if ctx.format == OutputFormat::Table && !job.task_groups.is_empty() {
        println!();
        let groups: Vec<TaskGroupRow> = job
            .task_groups
            .iter()
            .map(|g| TaskGroupRow {
                name: g.name.clone(),
                count: g.count,
            })
            .collect();
        ctx.print(&groups);
    }
}
