//! Test doubles for the store, notifier and code generator seams.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::auth::Claims;
use crate::database::{Account, AccountPatch, AccountStore, MemoryAccountStore, NewAccount, StoreError};
use crate::notify::{ApprovalCodeMessage, NotifyError, Notifier};
use crate::provisioning::CodeGenerator;
use crate::types::{AccountStatus, Role};

/// Hands out preset codes in order, repeating the last one
pub struct FixedCodes {
    codes: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    issued: AtomicUsize,
}

impl FixedCodes {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: VecDeque<String> = codes.into_iter().map(Into::into).collect();
        let last = codes.back().cloned().unwrap_or_else(|| "1000".to_string());
        Self {
            codes: Mutex::new(codes),
            last: Mutex::new(last),
            issued: AtomicUsize::new(0),
        }
    }

    /// Number of codes generated so far
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

impl CodeGenerator for FixedCodes {
    fn generate(&self) -> String {
        self.issued.fetch_add(1, Ordering::SeqCst);
        let next = self.codes.lock().unwrap().pop_front();
        match next {
            Some(code) => {
                *self.last.lock().unwrap() = code.clone();
                code
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

/// Captures every message instead of delivering it
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<ApprovalCodeMessage>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<ApprovalCodeMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|m| m.code.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_approval_code(&self, message: &ApprovalCodeMessage) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Every dispatch fails as if the mail service returned 503
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_approval_code(&self, _message: &ApprovalCodeMessage) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("store offline".to_string())
}

/// Store whose every call fails
pub struct UnavailableStore;

#[async_trait]
impl AccountStore for UnavailableStore {
    async fn find_by_role(&self, _role: Role) -> Result<Vec<Account>, StoreError> {
        Err(unavailable())
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<Account>, StoreError> {
        Err(unavailable())
    }

    async fn get(&self, _id: Uuid) -> Result<Option<Account>, StoreError> {
        Err(unavailable())
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        Err(unavailable())
    }

    async fn create(&self, _account: NewAccount) -> Result<Account, StoreError> {
        Err(unavailable())
    }

    async fn create_first_admin(&self, _account: NewAccount) -> Result<Option<Account>, StoreError> {
        Err(unavailable())
    }

    async fn update(&self, _id: Uuid, _patch: AccountPatch) -> Result<Account, StoreError> {
        Err(unavailable())
    }

    async fn set_status_many(&self, _ids: &[Uuid], _status: AccountStatus) -> Result<u64, StoreError> {
        Err(unavailable())
    }

    async fn delete(&self, _id: Uuid) -> Result<bool, StoreError> {
        Err(unavailable())
    }

    async fn delete_many(&self, _ids: &[Uuid]) -> Result<u64, StoreError> {
        Err(unavailable())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(unavailable())
    }
}

/// Memory store whose writes can be switched off
#[derive(Default)]
pub struct ReadOnlySwitchStore {
    pub inner: MemoryAccountStore,
    fail_writes: AtomicBool,
}

impl ReadOnlySwitchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AccountStore for ReadOnlySwitchStore {
    async fn find_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError> {
        self.inner.find_by_role(role).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.inner.find_by_email(email).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        self.inner.list().await
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        self.check()?;
        self.inner.create(account).await
    }

    async fn create_first_admin(&self, account: NewAccount) -> Result<Option<Account>, StoreError> {
        self.check()?;
        self.inner.create_first_admin(account).await
    }

    async fn update(&self, id: Uuid, patch: AccountPatch) -> Result<Account, StoreError> {
        self.check()?;
        self.inner.update(id, patch).await
    }

    async fn set_status_many(&self, ids: &[Uuid], status: AccountStatus) -> Result<u64, StoreError> {
        self.check()?;
        self.inner.set_status_many(ids, status).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.delete(id).await
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        self.check()?;
        self.inner.delete_many(ids).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

/// Memory store that yields to the scheduler before every call, so
/// concurrent callers interleave between awaits
#[derive(Default)]
pub struct YieldingStore {
    pub inner: MemoryAccountStore,
}

impl YieldingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for YieldingStore {
    async fn find_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.find_by_role(role).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.find_by_email(email).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.list().await
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        tokio::task::yield_now().await;
        self.inner.create(account).await
    }

    async fn create_first_admin(&self, account: NewAccount) -> Result<Option<Account>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.create_first_admin(account).await
    }

    async fn update(&self, id: Uuid, patch: AccountPatch) -> Result<Account, StoreError> {
        tokio::task::yield_now().await;
        self.inner.update(id, patch).await
    }

    async fn set_status_many(&self, ids: &[Uuid], status: AccountStatus) -> Result<u64, StoreError> {
        tokio::task::yield_now().await;
        self.inner.set_status_many(ids, status).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        tokio::task::yield_now().await;
        self.inner.delete(id).await
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        tokio::task::yield_now().await;
        self.inner.delete_many(ids).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

/// Sign a session token the way the identity service would
pub fn mint_token(secret: &str, email: &str) -> String {
    Claims::new(email, chrono::Duration::minutes(30))
        .sign(secret)
        .expect("test secret must be non-empty")
}
