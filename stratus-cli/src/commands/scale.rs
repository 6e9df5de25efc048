//! `stratus scale`: resize the cluster's instance group.

use super::{spinner, Context};
use anyhow::{Context as _, Result};
use colored::Colorize;
use stratus_core::ScaleRequest;

pub async fn scale(ctx: &Context, size: Option<String>, capability_iam: bool) -> Result<()> {
    let cluster = ctx.cluster()?;
    let (orchestrator, _) = ctx.connect().await?;

    let request = ScaleRequest { cluster: cluster.to_string(), size, capability_iam };
    let progress = spinner("Updating cluster stack...")?;
    let result = orchestrator.scale(&request).await;
    progress.finish_and_clear();
    let outcome = result.context("Failed to scale cluster")?;

    println!(
        "{} Cluster {} scaled to {} instance(s)",
        "✓".green().bold(),
        cluster.bold(),
        outcome.size.to_string().cyan()
    );
    Ok(())
}
