// handlers/protected/accounts.rs - the user-management table
use std::convert::Infallible;

use axum::extract::{Extension, Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::api::format::{account_to_api_value, event_to_api_value, page_to_api_value};
use crate::auth::Session;
use crate::database::AccountPatch;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{BulkAction, BulkOutcome};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct BulkBody {
    pub action: BulkAction,
    pub ids: Vec<Uuid>,
}

/// GET /api/accounts?search=&page=&per_page=
pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<Value> {
    let page = state
        .accounts
        .list(query.search.as_deref(), query.page, query.per_page)
        .await?;
    Ok(ApiResponse::success(page_to_api_value(&page)))
}

/// GET /api/accounts/stream - live change feed as server-sent events
pub async fn stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.accounts.subscribe();

    let events = stream::unfold(receiver, |mut receiver| async move {
        let event = match receiver.recv().await {
            Ok(event) => {
                Event::default()
                    .event("account")
                    .data(event_to_api_value(&event).to_string())
            }
            Err(RecvError::Lagged(skipped)) => {
                // Subscriber fell behind; tell it to refetch the table
                tracing::warn!("Account stream subscriber lagged by {} events", skipped);
                Event::default().event("resync").data(skipped.to_string())
            }
            Err(RecvError::Closed) => return None,
        };
        Some((Ok::<_, Infallible>(event), receiver))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// POST /api/accounts/:id/toggle - flip active/inactive
pub async fn toggle(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let account = state.accounts.toggle_active(&session, id).await?;
    Ok(ApiResponse::success(account_to_api_value(&account)))
}

/// PATCH /api/accounts/:id - edit name, role or status
pub async fn edit(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(patch): Json<AccountPatch>,
) -> ApiResult<Value> {
    let account = state.accounts.edit(&session, id, patch).await?;
    Ok(ApiResponse::success(account_to_api_value(&account)))
}

/// DELETE /api/accounts/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    state.accounts.delete(&session, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// POST /api/accounts/bulk - {"action": "activate" | "delete", "ids": [...]}
pub async fn bulk(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(body): Json<BulkBody>,
) -> ApiResult<BulkOutcome> {
    let outcome = state.accounts.bulk(&session, body.action, &body.ids).await?;
    Ok(ApiResponse::success(outcome))
}
