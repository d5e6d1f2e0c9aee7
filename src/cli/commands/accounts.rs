use anyhow::{anyhow, Context};
use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;

use crate::api::format::{account_to_api_value, page_to_api_value};
use crate::cli::utils::{output_success, print_account_table};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::{AccountPatch, AccountStore};
use crate::provisioning::{BootstrapDetector, FormMode};
use crate::services::AccountService;
use crate::state::open_store;
use crate::types::{normalize_email, AccountStatus, Role};

#[derive(Subcommand)]
pub enum AccountCommands {
    #[command(about = "List accounts, optionally filtered by name or email")]
    List {
        #[arg(long, help = "Case-insensitive match on name or email")]
        search: Option<String>,

        #[arg(long, help = "1-based page number")]
        page: Option<usize>,

        #[arg(long, help = "Rows per page")]
        per_page: Option<usize>,
    },

    #[command(about = "Report whether the next form opens in first-admin mode")]
    BootstrapStatus,

    #[command(about = "Mark an account active")]
    Activate {
        #[arg(help = "Account email")]
        email: String,
    },

    #[command(about = "Mark an account inactive")]
    Deactivate {
        #[arg(help = "Account email")]
        email: String,
    },
}

pub async fn handle(cmd: AccountCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    let store = open_store(config).await.context("failed to open the account store")?;

    match cmd {
        AccountCommands::List { search, page, per_page } => {
            let service = AccountService::new(
                store,
                config.security.page_size,
                config.security.max_page_size,
            );
            let page = service.list(search.as_deref(), page, per_page).await?;

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&page_to_api_value(&page))?);
                }
                OutputFormat::Text => {
                    if page.items.is_empty() {
                        println!("No accounts found");
                    } else {
                        print_account_table(&page.items);
                    }
                    println!(
                        "\nPage {} ({} per page, {} total){}{}",
                        page.page,
                        page.per_page,
                        page.total,
                        if page.has_prev { " [prev]" } else { "" },
                        if page.has_next { " [next]" } else { "" },
                    );
                }
            }
            Ok(())
        }
        AccountCommands::BootstrapStatus => {
            let detection = BootstrapDetector::new(store.clone()).detect().await;
            let admins = store.find_by_role(Role::Admin).await.map(|a| a.len()).ok();

            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "mode": detection.mode,
                            "admins": admins,
                            "notice": detection.notice,
                        }))?
                    );
                }
                OutputFormat::Text => {
                    let (mode, summary) = match detection.mode {
                        FormMode::FirstAdmin => ("first-admin", "the next form registers the first admin"),
                        FormMode::Normal => ("normal", "admin approval required for new accounts"),
                    };
                    println!("Mode: {} ({})", mode, summary);
                    if let Some(count) = admins {
                        println!("Admins: {}", count);
                    }
                    if let Some(notice) = detection.notice {
                        println!("Warning: {}", notice);
                    }
                }
            }
            Ok(())
        }
        AccountCommands::Activate { email } => set_status(store, &email, AccountStatus::Active, output_format).await,
        AccountCommands::Deactivate { email } => {
            set_status(store, &email, AccountStatus::Inactive, output_format).await
        }
    }
}

async fn set_status(
    store: Arc<dyn AccountStore>,
    email: &str,
    status: AccountStatus,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let email = normalize_email(email);
    let account = store
        .find_by_email(&email)
        .await?
        .ok_or_else(|| anyhow!("Account '{}' not found", email))?;

    let updated = store.update(account.id, AccountPatch::status(status)).await?;
    output_success(
        output_format,
        &format!("{} is now {}", updated.email, updated.status),
        Some(json!({ "account": account_to_api_value(&updated) })),
    )
}
