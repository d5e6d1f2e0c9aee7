use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{Account, AccountPatch, NewAccount};
use crate::database::store::{AccountStore, StoreError};
use crate::types::{normalize_email, AccountStatus, Role};

/// Process-local account store, used by tests and `STORE_BACKEND=memory`
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<Vec<Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account directly, bypassing any workflow
    pub async fn seed(&self, name: &str, email: &str, role: Role, status: AccountStatus) -> Account {
        let mut accounts = self.accounts.write().await;
        let account = Self::build(NewAccount::new(name, email, role, status));
        accounts.push(account.clone());
        account
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    fn insert(accounts: &mut Vec<Account>, account: NewAccount) -> Result<Account, StoreError> {
        let key = normalize_email(&account.email);
        if accounts.iter().any(|a| normalize_email(&a.email) == key) {
            return Err(StoreError::Conflict(format!(
                "an account with email '{}' already exists",
                account.email
            )));
        }
        let created = Self::build(account);
        accounts.push(created.clone());
        Ok(created)
    }

    fn build(new: NewAccount) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            role: new.role,
            status: new.status,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().filter(|a| a.role == role).cloned().collect())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let key = normalize_email(email);
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| normalize_email(&a.email) == key).cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.accounts.read().await.clone())
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        Self::insert(&mut accounts, account)
    }

    async fn create_first_admin(&self, account: NewAccount) -> Result<Option<Account>, StoreError> {
        // Check and insert under one write guard
        let mut accounts = self.accounts.write().await;
        if accounts.iter().any(|a| a.role == Role::Admin) {
            return Ok(None);
        }
        Self::insert(&mut accounts, account).map(Some)
    }

    async fn update(&self, id: Uuid, patch: AccountPatch) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", id)))?;
        patch.apply(account);
        Ok(account.clone())
    }

    async fn set_status_many(&self, ids: &[Uuid], status: AccountStatus) -> Result<u64, StoreError> {
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let mut accounts = self.accounts.write().await;
        let mut touched = 0;
        for account in accounts.iter_mut().filter(|a| wanted.contains(&a.id)) {
            AccountPatch::status(status).apply(account);
            touched += 1;
        }
        Ok(touched)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.write().await;
        let before = accounts.len();
        accounts.retain(|a| a.id != id);
        Ok(accounts.len() < before)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let mut accounts = self.accounts.write().await;
        let before = accounts.len();
        accounts.retain(|a| !wanted.contains(&a.id));
        Ok((before - accounts.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
