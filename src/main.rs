//! Lasso Sweep - Main Entry Point

use clap::Parser;
use lasso_sweep::cli::{cmd_grid, cmd_info, cmd_run, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lasso_sweep=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            cmd_run(&args)?;
        }
        Commands::Grid { min, max, count } => {
            cmd_grid(min, max, count)?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}
