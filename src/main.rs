//! Kolosal Churn - Main Entry Point

use clap::Parser;
use kolosal_churn::cli::{cmd_predict, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_churn=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, output, seed, test_size, cv_folds, models } => {
            // Training is CPU-bound; keep it off the async workers
            tokio::task::spawn_blocking(move || {
                cmd_train(&data, &output, seed, test_size, cv_folds, &models)
            })
            .await??;
        }
        Commands::Serve { host, port, model, lenient } => {
            cmd_serve(host, port, model, lenient).await?;
        }
        Commands::Predict { model, input, lenient } => {
            cmd_predict(&model, &input, lenient)?;
        }
    }

    Ok(())
}
