// handlers/public/provision.rs - /api/provision/* form lifecycle
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::MutexGuard;
use uuid::Uuid;

use crate::api::format::account_to_api_value;
use crate::database::Account;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::provisioning::{
    ApprovalRequest, FormHandle, FormStatus, ProvisioningForm, WorkflowError, MANAGEMENT_ROUTE,
};
use crate::services::AccountEvent;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct FirstAdminBody {
    pub name: String,
    pub email: String,
}

/// Result of a form reaching Verified
#[derive(Debug, Serialize)]
pub struct Completion {
    pub account: Value,
    pub notice: Option<String>,
    /// Route the console navigates to once the account exists
    pub next: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Discarded {
    pub id: Uuid,
    pub discarded: bool,
}

async fn find_form(state: &AppState, id: Uuid) -> Result<FormHandle, ApiError> {
    state
        .forms
        .get(id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Provisioning form {} not found", id)))
}

/// One operation per form at a time; a busy form is refused, not queued
fn lock_form(handle: &FormHandle) -> Result<MutexGuard<'_, ProvisioningForm>, ApiError> {
    handle
        .try_lock()
        .map_err(|_| ApiError::conflict("This form is busy with another request. Please wait."))
}

/// Record the failure notice on the form before surfacing it
fn fail(form: &mut ProvisioningForm, err: WorkflowError) -> ApiError {
    form.notice = Some(err.notice());
    err.into()
}

async fn complete(state: &AppState, form: &ProvisioningForm, account: Account) -> Completion {
    state.forms.remove(form.id).await;
    let account_value = account_to_api_value(&account);
    state.accounts.publish(AccountEvent::Created { account });
    Completion {
        account: account_value,
        notice: form.notice.clone(),
        next: MANAGEMENT_ROUTE,
    }
}

/// POST /api/provision - open a form, running bootstrap detection
pub async fn open(State(state): State<AppState>) -> ApiResult<FormStatus> {
    state.forms.purge_stale().await;
    let form = state.provisioner.open_form().await;
    let status = form.status();
    state.forms.insert(form).await;
    tracing::debug!("Opened provisioning form {} in {:?} mode", status.id, status.mode);
    Ok(ApiResponse::created(status))
}

/// GET /api/provision/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<FormStatus> {
    let handle = find_form(&state, id).await?;
    let form = lock_form(&handle)?;
    Ok(ApiResponse::success(form.status()))
}

/// POST /api/provision/:id/request - mail an approval code to the named admin
pub async fn request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ApprovalRequest>,
) -> ApiResult<FormStatus> {
    let handle = find_form(&state, id).await?;
    let mut form = lock_form(&handle)?;

    match state.provisioner.request_approval(&mut form, body).await {
        Ok(()) => Ok(ApiResponse::success(form.status())),
        Err(err) => Err(fail(&mut form, err)),
    }
}

/// POST /api/provision/:id/verify - submit the approval code
pub async fn verify(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<VerifyBody>,
) -> ApiResult<Completion> {
    let handle = find_form(&state, id).await?;
    let mut form = lock_form(&handle)?;

    match state.provisioner.verify(&mut form, &body.code).await {
        Ok(account) => Ok(ApiResponse::created(complete(&state, &form, account).await)),
        Err(err) => Err(fail(&mut form, err)),
    }
}

/// POST /api/provision/:id/first-admin - bootstrap registration, no code
pub async fn first_admin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<FirstAdminBody>,
) -> ApiResult<Completion> {
    let handle = find_form(&state, id).await?;
    let mut form = lock_form(&handle)?;

    match state
        .provisioner
        .register_first_admin(&mut form, &body.name, &body.email)
        .await
    {
        Ok(account) => Ok(ApiResponse::created(complete(&state, &form, account).await)),
        Err(err) => Err(fail(&mut form, err)),
    }
}

/// POST /api/provision/:id/cancel - drop an outstanding code
pub async fn cancel(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<FormStatus> {
    let handle = find_form(&state, id).await?;
    let mut form = lock_form(&handle)?;

    match state.provisioner.cancel(&mut form) {
        Ok(()) => Ok(ApiResponse::success(form.status())),
        Err(err) => Err(fail(&mut form, err)),
    }
}

/// DELETE /api/provision/:id - discard the form entirely
pub async fn discard(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Discarded> {
    let handle = find_form(&state, id).await?;
    // Refuse while another operation holds the form
    drop(lock_form(&handle)?);
    state.forms.remove(id).await;
    Ok(ApiResponse::success(Discarded { id, discarded: true }))
}
