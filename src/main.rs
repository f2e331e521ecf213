//! bikestore-ml - Main Entry Point

use bikestore_ml::cli::{cmd_info, cmd_runs, cmd_train, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bikestore_ml=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => {
            cmd_train(&args)?;
        }
        Commands::Runs {
            tracking_root,
            experiment,
        } => {
            cmd_runs(&tracking_root, experiment.as_deref())?;
        }
        Commands::Info { data, encoding } => {
            cmd_info(&data, &encoding)?;
        }
    }

    Ok(())
}
