use serde_json::{json, Value};

use crate::database::Account;
use crate::types::AccountStatus;
use crate::services::{AccountEvent, AccountPage};

/// Public wire format of an account row in the management table
pub fn account_to_api_value(account: &Account) -> Value {
    json!({
        "id": account.id,
        "name": account.name,
        "email": account.email,
        "role": account.role,
        "status": account.status,
        "active": account.is_active(),
        "created_at": account.created_at,
        "updated_at": account.updated_at,
    })
}

pub fn page_to_api_value(page: &AccountPage) -> Value {
    json!({
        "items": page.items.iter().map(account_to_api_value).collect::<Vec<_>>(),
        "pagination": {
            "total": page.total,
            "page": page.page,
            "per_page": page.per_page,
            "has_prev": page.has_prev,
            "has_next": page.has_next,
        }
    })
}

/// Payload of one live-stream event, tagged by `type`
pub fn event_to_api_value(event: &AccountEvent) -> Value {
    match event {
        AccountEvent::Created { account } => json!({
            "type": "created",
            "account": account_to_api_value(account),
        }),
        AccountEvent::Updated { account } => json!({
            "type": "updated",
            "account": account_to_api_value(account),
        }),
        AccountEvent::Deleted { id } => json!({ "type": "deleted", "id": id }),
        AccountEvent::BulkStatus { ids, status } => json!({
            "type": "bulk_status",
            "ids": ids,
            "status": status,
            "active": *status == AccountStatus::Active,
        }),
        AccountEvent::BulkDeleted { ids } => json!({ "type": "bulk_deleted", "ids": ids }),
    }
}
