mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pypack", about = "Package Python serverless functions into deployable zip archives")]
#[command(version)]
struct Cli {
    /// Project root containing pypack.toml
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and zip every Python function
    Package {
        /// Continue without prompting when the installer reports errors
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Remove the build directory and the builder container
    Cleanup,
    /// Print the effective build plan of every function as JSON
    Plan,
    /// Check pip, docker, and pypack.toml
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Package { yes } => commands::package(&cli.project, yes).await?,
        Commands::Cleanup => commands::cleanup(&cli.project).await?,
        Commands::Plan => commands::plan(&cli.project)?,
        Commands::Doctor => commands::doctor(&cli.project).await?,
    }

    Ok(())
}
