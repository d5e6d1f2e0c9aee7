use anyhow::{bail, Context};
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{config, StoreBackend};
use crate::database::DatabaseManager;

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Create the accounts table and indexes if missing")]
    Init,
}

pub async fn handle(cmd: DbCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DbCommands::Init => {
            let config = config();
            if config.store.backend != StoreBackend::Postgres {
                bail!("db init requires STORE_BACKEND=postgres");
            }

            let pool = DatabaseManager::connect(&config.store)
                .await
                .context("failed to connect to the account store")?;
            DatabaseManager::ensure_schema(&pool)
                .await
                .context("failed to create account schema")?;

            output_success(
                output_format,
                "Account schema is ready",
                Some(json!({ "table": "accounts" })),
            )
        }
    }
}
