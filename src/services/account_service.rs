use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Session;
use crate::database::{Account, AccountPatch, AccountStore, StoreError};
use crate::types::AccountStatus;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum AccountServiceError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Account {0} not found")]
    NotFound(Uuid),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Account store error: {0}")]
    Store(#[from] StoreError),
}

/// Change notifications for live account-list subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum AccountEvent {
    Created { account: Account },
    Updated { account: Account },
    Deleted { id: Uuid },
    BulkStatus { ids: Vec<Uuid>, status: AccountStatus },
    BulkDeleted { ids: Vec<Uuid> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Activate,
    Delete,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub action: BulkAction,
    pub requested: usize,
    pub affected: u64,
}

/// One page of the management table
#[derive(Debug, Clone, Serialize)]
pub struct AccountPage {
    pub items: Vec<Account>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

/// User-management operations behind the admin console table
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    events: broadcast::Sender<AccountEvent>,
    page_size: usize,
    max_page_size: usize,
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>, page_size: usize, max_page_size: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store,
            events,
            page_size: page_size.max(1),
            max_page_size: max_page_size.max(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.events.subscribe()
    }

    /// Send to live subscribers; having none is not an error
    pub fn publish(&self, event: AccountEvent) {
        let _ = self.events.send(event);
    }

    /// The account behind a session, which must be an active admin
    pub async fn authorize_admin(&self, actor: &Session) -> Result<Account, AccountServiceError> {
        let account = self.store.find_by_email(&actor.email).await?;
        match account {
            Some(account) if account.is_admin() && account.is_active() => Ok(account),
            Some(account) if account.is_admin() => {
                warn!("Inactive admin {} attempted a management action", actor.email);
                Err(AccountServiceError::Forbidden("Your admin account is not active.".to_string()))
            }
            _ => {
                warn!("Non-admin {} attempted a management action", actor.email);
                Err(AccountServiceError::Forbidden(
                    "Only admins can perform this action.".to_string(),
                ))
            }
        }
    }

    /// Case-insensitive search on name or email, then 1-based pagination
    pub async fn list(
        &self,
        search: Option<&str>,
        page: Option<usize>,
        per_page: Option<usize>,
    ) -> Result<AccountPage, AccountServiceError> {
        let per_page = per_page.unwrap_or(self.page_size).clamp(1, self.max_page_size);
        let page = page.unwrap_or(1).max(1);
        let needle = search.unwrap_or_default();

        let filtered: Vec<Account> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|a| a.matches_search(needle))
            .collect();

        let total = filtered.len();
        let start = (page - 1).saturating_mul(per_page);
        let items: Vec<Account> = filtered.into_iter().skip(start).take(per_page).collect();

        Ok(AccountPage {
            items,
            total,
            page,
            per_page,
            has_prev: page > 1,
            has_next: page.saturating_mul(per_page) < total,
        })
    }

    pub async fn toggle_active(&self, actor: &Session, id: Uuid) -> Result<Account, AccountServiceError> {
        let admin = self.authorize_admin(actor).await?;
        let account = self.store.get(id).await?.ok_or(AccountServiceError::NotFound(id))?;
        if account.id == admin.id {
            return Err(AccountServiceError::Forbidden(
                "You cannot deactivate your own account.".to_string(),
            ));
        }

        let updated = self
            .store
            .update(id, AccountPatch::status(account.status.toggled()))
            .await?;
        info!("{} set {} to {}", admin.email, updated.email, updated.status);
        self.publish(AccountEvent::Updated {
            account: updated.clone(),
        });
        Ok(updated)
    }

    pub async fn edit(
        &self,
        actor: &Session,
        id: Uuid,
        patch: AccountPatch,
    ) -> Result<Account, AccountServiceError> {
        let admin = self.authorize_admin(actor).await?;
        if patch.is_empty() {
            return Err(AccountServiceError::InvalidInput("Nothing to update.".to_string()));
        }
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AccountServiceError::InvalidInput("Name cannot be empty.".to_string()));
        }
        if id == admin.id {
            let demotes = patch.role.is_some_and(|r| !r.is_admin());
            let deactivates = patch.status.is_some_and(|s| !s.is_active());
            if demotes || deactivates {
                return Err(AccountServiceError::Forbidden(
                    "You cannot remove your own admin access.".to_string(),
                ));
            }
        }

        let updated = match self.store.update(id, patch).await {
            Err(StoreError::NotFound(_)) => return Err(AccountServiceError::NotFound(id)),
            other => other?,
        };
        info!("{} edited account {}", admin.email, updated.email);
        self.publish(AccountEvent::Updated {
            account: updated.clone(),
        });
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Session, id: Uuid) -> Result<(), AccountServiceError> {
        let admin = self.authorize_admin(actor).await?;
        if id == admin.id {
            return Err(AccountServiceError::Forbidden(
                "You cannot delete your own account.".to_string(),
            ));
        }
        if !self.store.delete(id).await? {
            return Err(AccountServiceError::NotFound(id));
        }
        info!("{} deleted account {}", admin.email, id);
        self.publish(AccountEvent::Deleted { id });
        Ok(())
    }

    pub async fn bulk(
        &self,
        actor: &Session,
        action: BulkAction,
        ids: &[Uuid],
    ) -> Result<BulkOutcome, AccountServiceError> {
        let admin = self.authorize_admin(actor).await?;
        let ids: Vec<Uuid> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Err(AccountServiceError::InvalidInput("Select at least one user.".to_string()));
        }

        let affected = match action {
            BulkAction::Activate => {
                let affected = self.store.set_status_many(&ids, AccountStatus::Active).await?;
                self.publish(AccountEvent::BulkStatus {
                    ids: ids.clone(),
                    status: AccountStatus::Active,
                });
                affected
            }
            BulkAction::Delete => {
                if ids.contains(&admin.id) {
                    return Err(AccountServiceError::Forbidden(
                        "You cannot delete your own account.".to_string(),
                    ));
                }
                let affected = self.store.delete_many(&ids).await?;
                self.publish(AccountEvent::BulkDeleted { ids: ids.clone() });
                affected
            }
        };

        info!("{} ran bulk {:?} on {} accounts ({} affected)", admin.email, action, ids.len(), affected);
        Ok(BulkOutcome {
            action,
            requested: ids.len(),
            affected,
        })
    }
}
