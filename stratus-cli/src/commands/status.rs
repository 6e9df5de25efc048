//! `stratus status`: show cluster state.

use super::Context;
use anyhow::Result;
use colored::{ColoredString, Colorize};
use stratus_core::clients::StackService;
use stratus_core::params::keys;
use stratus_core::ClusterState;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ParameterRow {
    #[tabled(rename = "PARAMETER")]
    key: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

fn colorize_state(state: ClusterState) -> ColoredString {
    match state {
        ClusterState::ActiveWithStack => state.as_str().green(),
        ClusterState::ActiveNoStack => state.as_str().yellow(),
        ClusterState::NonExistent => state.as_str().dimmed(),
        ClusterState::Deleting | ClusterState::ScaledUpdate => state.as_str().cyan(),
    }
}

pub async fn status(ctx: &Context) -> Result<()> {
    let cluster = ctx.cluster()?;
    let (orchestrator, provider) = ctx.connect().await?;

    let state = orchestrator.status(cluster).await?;
    println!("{} {}", "Cluster:".bold(), cluster);
    println!("{} {}", "State:".bold(), colorize_state(state));

    if state != ClusterState::ActiveWithStack {
        return Ok(());
    }

    let stack = orchestrator.stack_name(cluster);
    if let Some(status) = provider.stack_status(&stack).await {
        println!("{} {} ({})", "Stack:".bold(), stack, status.to_string().dimmed());
    }

    let rows: Vec<ParameterRow> = provider
        .stack_parameters(&stack)
        .await?
        .into_iter()
        // User data is a full MIME document.
        .filter(|p| p.key != keys::USER_DATA)
        .map(|p| ParameterRow { key: p.key, value: p.value.unwrap_or_default() })
        .collect();
    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!();
        println!("{}", table);
    }
    Ok(())
}
