use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{Account, AccountPatch, NewAccount};
use crate::types::{AccountStatus, Role};

/// Errors raised by an account store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Document store holding Account records.
///
/// Email lookups are case-insensitive and emails are unique under that
/// comparison; implementations report duplicates as [`StoreError::Conflict`].
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError>;

    async fn any_with_role(&self, role: Role) -> Result<bool, StoreError> {
        Ok(!self.find_by_role(role).await?.is_empty())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// All accounts, oldest first
    async fn list(&self) -> Result<Vec<Account>, StoreError>;

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Inserts `account` only while no admin exists, checking and writing as
    /// one step. `Ok(None)` means an admin was already present.
    async fn create_first_admin(&self, account: NewAccount) -> Result<Option<Account>, StoreError>;

    async fn update(&self, id: Uuid, patch: AccountPatch) -> Result<Account, StoreError>;

    /// Returns the number of accounts touched; unknown ids are skipped
    async fn set_status_many(&self, ids: &[Uuid], status: AccountStatus) -> Result<u64, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
