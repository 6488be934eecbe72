//! Kolosal Select - Main Entry Point
//!
//! Automated model selection from the command line.

use clap::Parser;
use kolosal_select::cli::{cmd_export, cmd_families, cmd_info, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_select=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data,
            target,
            task,
            trials,
            cv_folds,
            families,
            parallel,
            config,
            store,
            report,
        } => {
            cmd_train(
                &data,
                &target,
                task.as_deref(),
                trials,
                cv_folds,
                families.as_deref(),
                parallel,
                config.as_deref(),
                &store,
                report.as_deref(),
            )?;
        }
        Commands::Predict { family, data, store, output } => {
            cmd_predict(&family, &data, &store, output.as_deref())?;
        }
        Commands::Export { family, store, output } => {
            cmd_export(&family, &store, &output)?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
        Commands::Families { task } => {
            cmd_families(task.as_deref())?;
        }
    }

    Ok(())
}
