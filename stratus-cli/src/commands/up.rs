//! `stratus up`: create a cluster.

use super::{spinner, Context};
use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use stratus_core::{CreateRequest, LaunchMode};
use tabled::{settings::Style, Table, Tabled};
use tracing::warn;

#[derive(Args, Debug)]
pub struct UpArgs {
    /// Create only the cluster registration, without a stack
    #[arg(long)]
    pub empty: bool,

    /// Replace an existing stack for the cluster
    #[arg(short, long)]
    pub force: bool,

    /// Acknowledge that the stack may create IAM resources
    #[arg(long)]
    pub capability_iam: bool,

    /// Launch type (EC2 or FARGATE)
    #[arg(long, value_parser = parse_launch_type)]
    pub launch_type: Option<LaunchMode>,

    /// Key pair for SSH access to instances
    #[arg(long)]
    pub keypair: Option<String>,

    #[arg(long)]
    pub instance_type: Option<String>,

    /// Machine image id (defaults to the recommended image)
    #[arg(long)]
    pub image_id: Option<String>,

    /// Existing instance role name, instead of --capability-iam
    #[arg(long)]
    pub instance_role: Option<String>,

    /// Number of instances to launch
    #[arg(long)]
    pub size: Option<String>,

    /// Existing VPC id
    #[arg(long)]
    pub vpc: Option<String>,

    /// Two existing subnet ids (comma separated)
    #[arg(long)]
    pub subnets: Option<String>,

    /// Two availability zones for new subnets (comma separated)
    #[arg(long)]
    pub azs: Option<String>,

    /// Existing security group ids (comma separated)
    #[arg(long)]
    pub security_group: Option<String>,

    /// CIDR allowed to reach the instance port
    #[arg(long)]
    pub cidr: Option<String>,

    /// Port opened on instances
    #[arg(long)]
    pub port: Option<String>,

    /// Maximum spot price; launches spot instances when set
    #[arg(long)]
    pub spot_price: Option<String>,

    /// Do not assign public IP addresses to instances
    #[arg(long)]
    pub no_associate_public_ip_address: bool,

    /// Require IMDSv2 on instances
    #[arg(long)]
    pub imdsv2: bool,

    /// Extra user data file (shell script or cloud-config); repeatable
    #[arg(long)]
    pub extra_user_data: Vec<PathBuf>,

    /// Resource tags (KEY=VALUE,...)
    #[arg(long)]
    pub tags: Option<String>,
}

fn parse_launch_type(s: &str) -> Result<LaunchMode, String> {
    LaunchMode::parse(s).ok_or_else(|| format!("invalid launch type '{}': expected EC2 or FARGATE", s))
}

impl UpArgs {
    fn into_request(self, cluster: &str, default_launch_mode: LaunchMode) -> CreateRequest {
        CreateRequest {
            cluster: cluster.to_string(),
            launch_mode: self.launch_type.unwrap_or(default_launch_mode),
            empty: self.empty,
            force: self.force,
            capability_iam: self.capability_iam,
            key_pair: self.keypair,
            instance_type: self.instance_type,
            image_id: self.image_id,
            instance_role: self.instance_role,
            size: self.size,
            vpc_id: self.vpc,
            subnet_ids: self.subnets,
            vpc_azs: self.azs,
            security_groups: self.security_group,
            source_cidr: self.cidr,
            port: self.port,
            spot_price: self.spot_price,
            no_public_ip: self.no_associate_public_ip_address,
            imds_v2: self.imdsv2,
            user_data_files: self.extra_user_data,
            resource_tags: self.tags,
        }
    }
}

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "RESOURCE")]
    logical_id: String,
    #[tabled(rename = "TYPE")]
    resource_type: String,
    #[tabled(rename = "ID")]
    physical_id: String,
}

/// Create the cluster and print the network it ended up with.
pub async fn up(ctx: &Context, args: UpArgs) -> Result<()> {
    let cluster = ctx.cluster()?.to_string();
    let request = args.into_request(&cluster, ctx.config.default_launch_mode);
    let (orchestrator, _) = ctx.connect().await?;

    let mode = if request.empty { "empty" } else { request.launch_mode.as_str() };
    println!("{} Creating cluster {} ({})", "→".cyan().bold(), cluster.bold(), mode.dimmed());

    let progress = spinner("Provisioning cluster resources (this may take a while)...")?;
    let result = orchestrator.create(&request).await;
    progress.finish_and_clear();
    let outcome = result.context("Failed to create cluster")?;

    println!("{} Cluster created: {}", "✓".green().bold(), outcome.registry_id.bold());

    let Some((stack, _)) = &outcome.stack else {
        return Ok(());
    };
    println!("  {} {}", "Stack:".dimmed(), stack);

    match orchestrator.network_resources(&cluster).await {
        Ok(resources) if resources.is_empty() => {
            println!("  {}", "Using existing network resources".dimmed());
        }
        Ok(resources) => {
            let rows: Vec<ResourceRow> = resources
                .into_iter()
                .map(|r| ResourceRow {
                    logical_id: r.logical_id,
                    resource_type: r.resource_type,
                    physical_id: r.physical_id,
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!();
            println!("{}", table);
        }
        Err(e) => warn!("Failed to describe network resources: {}", e),
    }

    Ok(())
}
