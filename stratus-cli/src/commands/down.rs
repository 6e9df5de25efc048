//! `stratus down`: delete a cluster.

use super::Context;
use anyhow::{Context as _, Result};
use colored::Colorize;
use stratus_core::DeleteRequest;

pub async fn down(ctx: &Context, force: bool) -> Result<()> {
    let cluster = ctx.cluster()?;
    let (orchestrator, _) = ctx.connect().await?;

    // No spinner: the confirmation prompt reads from the terminal.
    let request = DeleteRequest { cluster: cluster.to_string(), force };
    let outcome = orchestrator.delete(&request).await.context("Failed to delete cluster")?;

    if outcome.stack_deleted {
        println!("{} Deleted stack {}", "✓".green().bold(), orchestrator.stack_name(cluster));
    }
    println!("{} Cluster deleted: {}", "✓".green().bold(), outcome.registry_id.bold());
    Ok(())
}
