use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Container cluster provisioning CLI", long_about = None)]
struct Cli {
    /// Cluster name (defaults to the configured cluster)
    #[arg(long, global = true, env = "STRATUS_CLUSTER")]
    cluster: Option<String>,

    /// Region used for instance-type offerings
    #[arg(long, global = true)]
    region: Option<String>,

    /// Local backend state file
    #[arg(long, global = true, env = "STRATUS_STATE_FILE")]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a cluster and its infrastructure stack
    Up(commands::up::UpArgs),

    /// Delete a cluster and its stack
    Down {
        /// Delete without asking for confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Change the maximum number of cluster instances
    Scale {
        /// New maximum instance count
        #[arg(long)]
        size: Option<String>,

        /// Acknowledge that the update may create IAM resources
        #[arg(long)]
        capability_iam: bool,
    },

    /// Show cluster and stack state
    Status,

    /// Print the rendered cluster stack template
    Template {
        /// Tags to embed (KEY=VALUE,...)
        #[arg(long)]
        tags: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = commands::Context::load(cli.cluster, cli.region, cli.state_file)?;

    match cli.command {
        Commands::Up(args) => commands::up::up(&ctx, args).await?,
        Commands::Down { force } => commands::down::down(&ctx, force).await?,
        Commands::Scale { size, capability_iam } => {
            commands::scale::scale(&ctx, size, capability_iam).await?
        }
        Commands::Status => commands::status::status(&ctx).await?,
        Commands::Template { tags } => commands::template::template(&ctx, tags.as_deref())?,
    }

    Ok(())
}
