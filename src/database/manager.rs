use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::StoreConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

const CREATE_ACCOUNTS: &str = r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id          UUID PRIMARY KEY,
        name        TEXT NOT NULL,
        email       TEXT NOT NULL,
        role        TEXT NOT NULL CHECK (role IN ('admin', 'candidate', 'user')),
        status      TEXT NOT NULL CHECK (status IN ('active', 'inactive')),
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

const CREATE_EMAIL_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS accounts_email_lower_idx ON accounts (lower(email))";

const CREATE_ROLE_INDEX: &str = "CREATE INDEX IF NOT EXISTS accounts_role_idx ON accounts (role)";

/// Connection setup and schema management for the Postgres account store
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open a pool against the configured DATABASE_URL
    pub async fn connect(config: &StoreConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let redacted_url = Self::redacted(url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(url)
            .await?;

        info!("Connected account store pool: {}", redacted_url);
        Ok(pool)
    }

    /// Create the accounts table and indexes if they are missing
    pub async fn ensure_schema(pool: &PgPool) -> Result<(), DatabaseError> {
        for statement in [CREATE_ACCOUNTS, CREATE_EMAIL_INDEX, CREATE_ROLE_INDEX] {
            sqlx::query(statement).execute(pool).await?;
        }
        info!("Account schema is up to date");
        Ok(())
    }

    /// Strip credentials so the URL can be logged
    fn redacted(database_url: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(database_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if url.password().is_some() {
            url.set_password(Some("***")).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(url.into())
    }
}
