use axum::extract::{Extension, State};
use serde_json::{json, Value};

use crate::api::format::account_to_api_value;
use crate::auth::Session;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/auth/whoami - the session plus the account it maps to, if any
pub async fn whoami(State(state): State<AppState>, Extension(session): Extension<Session>) -> ApiResult<Value> {
    let account = state.store.find_by_email(&session.email).await?;
    Ok(ApiResponse::success(json!({
        "session": session,
        "account": account.as_ref().map(account_to_api_value),
    })))
}

/// DELETE /api/auth/session - logout; the token is refused from now on
pub async fn logout(State(state): State<AppState>, Extension(session): Extension<Session>) -> ApiResult<Value> {
    state.sessions.logout(&session).await;
    Ok(ApiResponse::success(json!({ "logged_out": true })))
}
