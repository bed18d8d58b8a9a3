mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::{Context, GlobalArgs};

#[derive(Parser)]
#[command(
    name = "ferry",
    about = "Build, template and publish release artifacts from CI"
)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved build info as JSON
    Version {
        /// Include release channel names
        #[arg(long)]
        channels: bool,
    },
    /// Render [[ ]] placeholders in files or directories, in place
    Template {
        /// Files or directories to render (default: the charts directory)
        paths: Vec<PathBuf>,
    },
    /// Template charts, build the container image and package the charts
    Build,
    /// Log in to the registry and push every image tag
    Publish,
    /// Create or update the GitHub release for the current tag
    Release {
        /// Directory whose files are uploaded as release assets
        #[arg(long)]
        assets_dir: Option<PathBuf>,
        /// Create the release as a draft
        #[arg(long)]
        draft: bool,
        /// GitHub API token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: String,
    },
    /// Add the release to CHANGELOG.md and bump the version file
    PrepareRelease {
        /// Version being released, without the leading `v`
        #[arg(long)]
        version: String,
    },
    /// Create a GitHub deployment for the current commit
    Deploy {
        /// Target environment name
        #[arg(long)]
        environment: String,
        /// GitHub API token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.global.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::load(&cli.global)?;

    match cli.command {
        Commands::Version { channels } => commands::version(&ctx, channels).await?,
        Commands::Template { paths } => commands::template(&ctx, paths).await?,
        Commands::Build => commands::build(&ctx).await?,
        Commands::Publish => commands::publish(&ctx).await?,
        Commands::Release {
            assets_dir,
            draft,
            github_token,
        } => commands::release(&ctx, assets_dir, draft, github_token.into()).await?,
        Commands::PrepareRelease { version } => commands::prepare_release(&ctx, &version).await?,
        Commands::Deploy {
            environment,
            github_token,
        } => commands::deploy(&ctx, &environment, github_token.into()).await?,
    }

    Ok(())
}
