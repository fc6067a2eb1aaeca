//! memo-sync
//!
//! Keeps the document store convergent with the memo collection files committed
//! to the repository.

mod config;
mod db;
mod errors;
mod gateways;
mod models;
mod provider;
mod repositories;
mod schema;
mod sync;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use errors::AppError;
use models::UpdatedCollections;
use provider::Provider;
use sync::ChangeDetector;

#[derive(Parser, Debug)]
#[command(name = "memo-sync", version, about = "Sync memo collections into the document store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync the collections changed since the last merge commit.
    Sync {
        /// Read `{added, updated, removed}` ids from MEMO_UPDATED_COLLECTIONS instead of git.
        #[arg(long)]
        from_env: bool,

        /// Print the plan without writing to the store.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the changed collection ids as `{added, updated, removed}` JSON.
    Diff,

    /// Check every local collection file for integrity problems.
    Check,

    /// Print stored collections by id. Unknown ids are skipped.
    Inspect {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            if init_logging("info", LogFormat::Text).is_ok() {
                tracing::error!(code = err.error_code(), "{}", err);
            } else {
                eprintln!("{}", err);
            }
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logging(&config.log_level, config.log_format) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }

    tracing::debug!("Database path: {:?}", config.db_path);
    tracing::debug!("Collections directory: {:?}", config.collections_dir);

    match execute(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(code = err.error_code(), "{}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(log_level: &str, format: LogFormat) -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Logs go to stderr, stdout carries command output
    let (text_layer, json_layer) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)), None),
        LogFormat::Json => (
            None,
            Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .map_err(|e| AppError::Other(format!("Failed to install the log subscriber: {}", e)))
}

async fn execute(command: Commands, config: Config) -> Result<(), AppError> {
    match command {
        Commands::Sync { from_env, dry_run } => {
            let changes = if from_env {
                Some(UpdatedCollections::from_env_payload(config.updated_collections.as_deref())?)
            } else {
                None
            };

            let provider = Provider::new(config);
            let sync_collections = provider.sync_collections().await?.dry_run(dry_run);

            let report = match changes {
                Some(changes) => sync_collections.run_with_changes(changes.into()).await?,
                None => sync_collections.run().await?,
            };
            print_json(&report)
        }
        Commands::Diff => {
            let files = Provider::new(config).revision_differ().changed_files().await?;
            print_json(&sync::extract_ids(&files))
        }
        Commands::Check => {
            let local = Provider::new(config).local_collections_repository();
            let report = sync::check_corpus(&local).await?;
            print_json(&report)?;
            if report.is_ok() {
                Ok(())
            } else {
                Err(AppError::Validation(format!(
                    "{} integrity problems in {} collection files",
                    report.problems.len(),
                    report.checked
                )))
            }
        }
        Commands::Inspect { ids } => {
            let collections = Provider::new(config)
                .stored_collections_repository()
                .await?
                .get_collections_by_ids(&ids)
                .await?;
            tracing::info!(requested = ids.len(), found = collections.len(), "Stored collections fetched");
            print_json(&collections)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests;
