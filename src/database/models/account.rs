use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{normalize_email, AccountStatus, Role};

/// Persisted identity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Case-insensitive substring match on name or email; empty needle matches everything.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle) || self.email.to_lowercase().contains(&needle)
    }
}

/// Raw row shape; role and status are stored as text columns
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = String;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role.parse()?,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for creating an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
}

impl NewAccount {
    pub fn new(name: impl Into<String>, email: &str, role: Role, status: AccountStatus) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: normalize_email(email),
            role,
            status,
        }
    }
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
}

impl AccountPatch {
    pub fn status(status: AccountStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.role.is_none() && self.status.is_none()
    }

    pub fn apply(&self, account: &mut Account) {
        if let Some(name) = &self.name {
            account.name = name.trim().to_string();
        }
        if let Some(role) = self.role {
            account.role = role;
        }
        if let Some(status) = self.status {
            account.status = status;
        }
        account.updated_at = Utc::now();
    }
}
