use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::{Account, AccountPatch, AccountRow, NewAccount};
use crate::database::store::{AccountStore, StoreError};
use crate::types::{AccountStatus, Role};

const ACCOUNT_COLUMNS: &str = "id, name, email, role, status, created_at, updated_at";

/// Advisory lock key held while a first-admin insert runs
const BOOTSTRAP_LOCK_KEY: i64 = 0x7262_6163;

/// Account store backed by the `accounts` table
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode(row: AccountRow) -> Result<Account, StoreError> {
        let id = row.id;
        Account::try_from(row).map_err(|e| StoreError::Corrupt(format!("account {}: {}", id, e)))
    }

    fn decode_all(rows: Vec<AccountRow>) -> Result<Vec<Account>, StoreError> {
        rows.into_iter().map(Self::decode).collect()
    }

    fn map_write_error(err: sqlx::Error, email: &str) -> StoreError {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(format!("an account with email '{}' already exists", email))
            }
            _ => StoreError::Sqlx(err),
        }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE role = $1 ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        );
        let rows: Vec<AccountRow> = sqlx::query_as(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await?;
        Self::decode_all(rows)
    }

    async fn any_with_role(&self, role: Role) -> Result<bool, StoreError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM accounts WHERE role = $1)")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE lower(email) = lower($1) LIMIT 1",
            ACCOUNT_COLUMNS
        );
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::decode).transpose()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::decode).transpose()
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        let sql = format!("SELECT {} FROM accounts ORDER BY created_at, id", ACCOUNT_COLUMNS);
        let rows: Vec<AccountRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Self::decode_all(rows)
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let sql = format!(
            "INSERT INTO accounts (id, name, email, role, status) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let row: AccountRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(&account.name)
            .bind(&account.email)
            .bind(account.role.as_str())
            .bind(account.status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(e, &account.email))?;
        Self::decode(row)
    }

    async fn create_first_admin(&self, account: NewAccount) -> Result<Option<Account>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Concurrent bootstrap submissions queue here until the holder commits
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(BOOTSTRAP_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            r#"INSERT INTO accounts (id, name, email, role, status)
            SELECT $1::uuid, $2::text, $3::text, $4::text, $5::text
            WHERE NOT EXISTS (SELECT 1 FROM accounts WHERE role = $4::text)
            RETURNING {}"#,
            ACCOUNT_COLUMNS
        );
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(&account.name)
            .bind(&account.email)
            .bind(account.role.as_str())
            .bind(account.status.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Self::map_write_error(e, &account.email))?;

        tx.commit().await?;
        row.map(Self::decode).transpose()
    }

    async fn update(&self, id: Uuid, patch: AccountPatch) -> Result<Account, StoreError> {
        let sql = format!(
            r#"UPDATE accounts SET
                name = COALESCE($2, name),
                role = COALESCE($3, role),
                status = COALESCE($4, status),
                updated_at = now()
            WHERE id = $1
            RETURNING {}"#,
            ACCOUNT_COLUMNS
        );
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(patch.name.as_deref().map(str::trim))
            .bind(patch.role.map(|r| r.as_str()))
            .bind(patch.status.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::decode(row),
            None => Err(StoreError::NotFound(format!("account {}", id))),
        }
    }

    async fn set_status_many(&self, ids: &[Uuid], status: AccountStatus) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("UPDATE accounts SET status = $2, updated_at = now() WHERE id = ANY($1)")
            .bind(ids)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM accounts WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
