use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::bootstrap::{BootstrapDetector, FormMode};
use super::error::WorkflowError;
use super::otp::{CodeGenerator, OtpPolicy, PendingCode};
use crate::database::{Account, AccountStore, NewAccount};
use crate::notify::{ApprovalCodeMessage, Notifier};
use crate::types::{normalize_email, AccountStatus, Role};

/// Candidate details entered on the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Payload of the "request approval" action
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    pub approver_email: String,
}

/// Idle -> OtpRequested -> Verified | Failed, where Failed may be retried.
#[derive(Debug, Clone)]
pub enum WorkflowState {
    Idle,
    OtpRequested(PendingCode),
    Failed(PendingCode),
    Verified,
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::OtpRequested(_) => "otp_requested",
            WorkflowState::Failed(_) => "failed",
            WorkflowState::Verified => "verified",
        }
    }

    fn pending(&self) -> Option<&PendingCode> {
        match self {
            WorkflowState::OtpRequested(p) | WorkflowState::Failed(p) => Some(p),
            _ => None,
        }
    }
}

/// Transient provisioning request. The issued code never leaves this value.
#[derive(Debug)]
pub struct ProvisioningForm {
    pub id: Uuid,
    pub mode: FormMode,
    pub state: WorkflowState,
    pub candidate: Option<Candidate>,
    pub notice: Option<String>,
    pub opened_at: Instant,
}

/// Serializable view of a form for API responses
#[derive(Debug, Clone, Serialize)]
pub struct FormStatus {
    pub id: Uuid,
    pub mode: FormMode,
    pub state: &'static str,
    pub default_role: Role,
    pub role_locked: bool,
    pub candidate: Option<Candidate>,
    pub approver_email: Option<String>,
    pub failed_attempts: u32,
    pub notice: Option<String>,
}

impl ProvisioningForm {
    fn new(mode: FormMode, notice: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            state: WorkflowState::Idle,
            candidate: None,
            notice,
            opened_at: Instant::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, WorkflowState::Verified)
    }

    /// Role preselected by the form: admin in first-admin mode
    pub fn default_role(&self) -> Role {
        match self.mode {
            FormMode::FirstAdmin => Role::Admin,
            FormMode::Normal => Role::User,
        }
    }

    pub fn status(&self) -> FormStatus {
        let pending = self.state.pending();
        FormStatus {
            id: self.id,
            mode: self.mode,
            state: self.state.name(),
            default_role: self.default_role(),
            role_locked: self.mode == FormMode::FirstAdmin,
            candidate: self.candidate.clone(),
            approver_email: pending.map(|p| p.approver.clone()),
            failed_attempts: pending.map(|p| p.failed_attempts).unwrap_or(0),
            notice: self.notice.clone(),
        }
    }
}

fn validate_identity(name: &str, email: &str) -> Result<(), WorkflowError> {
    if name.trim().is_empty() {
        return Err(WorkflowError::InvalidInput("Name is required.".to_string()));
    }
    validate_email(email, "Email")
}

fn validate_email(email: &str, field: &str) -> Result<(), WorkflowError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(WorkflowError::InvalidInput(format!("{} must be a valid email address.", field)))
    }
}

/// Drives provisioning forms against injected collaborators
pub struct Provisioner {
    store: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    codes: Arc<dyn CodeGenerator>,
    policy: OtpPolicy,
}

impl Provisioner {
    pub fn new(
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        codes: Arc<dyn CodeGenerator>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            codes,
            policy,
        }
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    /// Runs bootstrap detection once and returns a fresh form in `Idle`
    pub async fn open_form(&self) -> ProvisioningForm {
        let detection = BootstrapDetector::new(self.store.clone()).detect().await;
        ProvisioningForm::new(detection.mode, detection.notice)
    }

    /// Idle -> OtpRequested. Nothing is generated or sent unless the approver
    /// is an existing admin.
    pub async fn request_approval(
        &self,
        form: &mut ProvisioningForm,
        request: ApprovalRequest,
    ) -> Result<(), WorkflowError> {
        if form.mode == FormMode::FirstAdmin {
            return Err(WorkflowError::FirstAdminMode);
        }
        match form.state {
            WorkflowState::Idle => {}
            WorkflowState::Verified => return Err(WorkflowError::Completed),
            WorkflowState::OtpRequested(_) | WorkflowState::Failed(_) => {
                warn!("Rejected duplicate approval request for form {}", form.id);
                return Err(WorkflowError::AlreadyRequested);
            }
        }

        validate_identity(&request.name, &request.email)?;
        validate_email(&request.approver_email, "Admin email")?;

        let approver_email = normalize_email(&request.approver_email);
        let approver = self
            .store
            .find_by_email(&approver_email)
            .await
            .map_err(|e| {
                error!("Error looking up approver {}: {}", approver_email, e);
                WorkflowError::Lookup(e)
            })?
            .ok_or_else(|| {
                warn!("Approval requested from unknown admin email {}", approver_email);
                WorkflowError::ApproverNotFound(approver_email.clone())
            })?;

        if !approver.is_admin() {
            warn!(
                "Approval requested from {} whose role is {}, not admin",
                approver_email, approver.role
            );
            return Err(WorkflowError::ApproverNotAdmin(approver_email));
        }

        let candidate = Candidate {
            name: request.name.trim().to_string(),
            email: normalize_email(&request.email),
            role: request.role,
        };

        let existing = self.store.find_by_email(&candidate.email).await.map_err(|e| {
            error!("Error looking up candidate {}: {}", candidate.email, e);
            WorkflowError::Lookup(e)
        })?;
        if existing.is_some() {
            return Err(WorkflowError::CandidateExists(candidate.email));
        }

        let message = ApprovalCodeMessage {
            recipient: approver.email.clone(),
            code: self.codes.generate(),
        };

        // A failed dispatch leaves the form in Idle and drops the code
        if let Err(e) = self.notifier.send_approval_code(&message).await {
            error!("Error sending OTP to {}: {}", message.recipient, e);
            return Err(WorkflowError::Dispatch(e));
        }

        info!(
            "OTP sent to {} for candidate {} (form {})",
            message.recipient, candidate.email, form.id
        );
        form.candidate = Some(candidate);
        form.state = WorkflowState::OtpRequested(PendingCode::new(message.code, message.recipient));
        form.notice = Some("OTP sent to admin email!".to_string());
        Ok(())
    }

    /// OtpRequested | Failed -> Verified on an exact match, persisting one
    /// inactive account; a mismatch moves to (or stays in) Failed.
    pub async fn verify(&self, form: &mut ProvisioningForm, code: &str) -> Result<Account, WorkflowError> {
        let mut pending = match &form.state {
            WorkflowState::Verified => return Err(WorkflowError::Completed),
            WorkflowState::Idle => return Err(WorkflowError::NoCodeRequested),
            WorkflowState::OtpRequested(p) | WorkflowState::Failed(p) => p.clone(),
        };

        if pending.is_expired(&self.policy) {
            warn!("Expired OTP submitted for form {}", form.id);
            form.state = WorkflowState::Idle;
            return Err(WorkflowError::CodeExpired);
        }

        if !pending.matches(code) {
            pending.failed_attempts += 1;
            let remaining = pending.attempts_remaining(&self.policy);
            if remaining == Some(0) {
                warn!("OTP attempts exhausted for form {}", form.id);
                form.state = WorkflowState::Idle;
                return Err(WorkflowError::AttemptsExhausted);
            }
            warn!("Invalid OTP for form {} (attempt {})", form.id, pending.failed_attempts);
            form.state = WorkflowState::Failed(pending);
            let err = WorkflowError::CodeMismatch {
                attempts_remaining: remaining,
            };
            form.notice = Some(err.notice());
            return Err(err);
        }

        let candidate = form.candidate.clone().ok_or(WorkflowError::NoCodeRequested)?;
        let account = self
            .store
            .create(NewAccount::new(
                candidate.name,
                &candidate.email,
                candidate.role,
                AccountStatus::Inactive,
            ))
            .await
            .map_err(|e| {
                error!("Error saving user data for {}: {}", candidate.email, e);
                WorkflowError::Store(e)
            })?;

        info!("OTP verified; account {} created with role {}", account.email, account.role);
        form.state = WorkflowState::Verified;
        form.notice = Some("OTP verified successfully!".to_string());
        Ok(account)
    }

    /// Bootstrap short-circuit: creates the first admin, active, without a code.
    pub async fn register_first_admin(
        &self,
        form: &mut ProvisioningForm,
        name: &str,
        email: &str,
    ) -> Result<Account, WorkflowError> {
        if form.is_complete() {
            return Err(WorkflowError::Completed);
        }
        if form.mode != FormMode::FirstAdmin {
            return Err(WorkflowError::NotFirstAdminMode);
        }
        validate_identity(name, email)?;

        // Another form may have registered an admin since detection ran; the
        // store checks and inserts in one step
        let created = self
            .store
            .create_first_admin(NewAccount::new(name, email, Role::Admin, AccountStatus::Active))
            .await
            .map_err(|e| {
                error!("Error adding first admin {}: {}", email, e);
                WorkflowError::Store(e)
            })?;
        let Some(account) = created else {
            warn!("First-admin submission on form {} after an admin appeared", form.id);
            form.mode = FormMode::Normal;
            return Err(WorkflowError::BootstrapClosed);
        };

        info!("First admin registered: {}", account.email);
        form.candidate = Some(Candidate {
            name: account.name.clone(),
            email: account.email.clone(),
            role: Role::Admin,
        });
        form.state = WorkflowState::Verified;
        form.notice = Some("First admin registered successfully!".to_string());
        Ok(account)
    }

    /// Discards an outstanding code so a new request can be made
    pub fn cancel(&self, form: &mut ProvisioningForm) -> Result<(), WorkflowError> {
        if form.is_complete() {
            return Err(WorkflowError::Completed);
        }
        form.state = WorkflowState::Idle;
        form.candidate = None;
        form.notice = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryAccountStore;
    use crate::testing::{
        FailingNotifier, FixedCodes, ReadOnlySwitchStore, RecordingNotifier, UnavailableStore, YieldingStore,
    };
    use std::time::Duration;

    struct Harness {
        store: Arc<MemoryAccountStore>,
        notifier: Arc<RecordingNotifier>,
        codes: Arc<FixedCodes>,
        provisioner: Provisioner,
    }

    fn harness_with(store: Arc<MemoryAccountStore>, policy: OtpPolicy) -> Harness {
        let notifier = Arc::new(RecordingNotifier::new());
        let codes = Arc::new(FixedCodes::new(["4321", "5555", "6666"]));
        let provisioner = Provisioner::new(store.clone(), notifier.clone(), codes.clone(), policy);
        Harness {
            store,
            notifier,
            codes,
            provisioner,
        }
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemoryAccountStore::new());
        store.seed("Ann", "a@x.com", Role::Admin, AccountStatus::Active).await;
        harness_with(store, OtpPolicy::default())
    }

    fn bob(approver: &str) -> ApprovalRequest {
        ApprovalRequest {
            name: "Bob".into(),
            email: "b@x.com".into(),
            role: Role::User,
            approver_email: approver.into(),
        }
    }

    #[tokio::test]
    async fn scenario_matching_code_creates_inactive_account() {
        let h = harness().await;
        let mut form = h.provisioner.open_form().await;
        assert_eq!(form.mode, FormMode::Normal);

        h.provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap();
        assert_eq!(form.state.name(), "otp_requested");

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "a@x.com");
        assert_eq!(sent[0].code, "4321");

        let account = h.provisioner.verify(&mut form, "4321").await.unwrap();
        assert_eq!(account.name, "Bob");
        assert_eq!(account.email, "b@x.com");
        assert_eq!(account.role, Role::User);
        assert_eq!(account.status, AccountStatus::Inactive);
        assert_eq!(form.state.name(), "verified");
        assert_eq!(h.store.len().await, 2);
    }

    #[tokio::test]
    async fn scenario_wrong_code_creates_nothing_and_allows_retry() {
        let h = harness().await;
        let mut form = h.provisioner.open_form().await;
        h.provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap();

        for _ in 0..25 {
            let err = h.provisioner.verify(&mut form, "1234").await.unwrap_err();
            assert!(matches!(err, WorkflowError::CodeMismatch { attempts_remaining: None }));
            assert_eq!(err.notice(), "Invalid OTP. Please try again.");
            assert_eq!(form.state.name(), "failed");
        }
        assert_eq!(h.store.len().await, 1);

        // Same code still valid, no new request needed
        h.provisioner.verify(&mut form, "4321").await.unwrap();
        assert_eq!(h.store.len().await, 2);
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn unknown_approver_generates_no_code() {
        let h = harness().await;
        let mut form = h.provisioner.open_form().await;
        let err = h
            .provisioner
            .request_approval(&mut form, bob("nobody@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ApproverNotFound(_)));
        assert_eq!(h.codes.issued(), 0);
        assert!(h.notifier.sent().is_empty());
        assert_eq!(form.state.name(), "idle");
    }

    #[tokio::test]
    async fn non_admin_approver_generates_no_code() {
        let h = harness().await;
        h.store.seed("Uma", "u@x.com", Role::User, AccountStatus::Active).await;
        h.store.seed("Cy", "c@x.com", Role::Candidate, AccountStatus::Active).await;
        let mut form = h.provisioner.open_form().await;

        for approver in ["u@x.com", "c@x.com"] {
            let err = h.provisioner.request_approval(&mut form, bob(approver)).await.unwrap_err();
            assert!(matches!(err, WorkflowError::ApproverNotAdmin(_)));
        }
        assert_eq!(h.codes.issued(), 0);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn approver_email_is_case_normalized() {
        let h = harness().await;
        let mut form = h.provisioner.open_form().await;
        h.provisioner.request_approval(&mut form, bob("  A@X.COM ")).await.unwrap();
        assert_eq!(h.notifier.sent()[0].recipient, "a@x.com");
    }

    #[tokio::test]
    async fn second_request_is_rejected_while_code_outstanding() {
        let h = harness().await;
        let mut form = h.provisioner.open_form().await;
        h.provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap();

        let err = h.provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyRequested));
        assert_eq!(h.codes.issued(), 1);

        h.provisioner.cancel(&mut form).unwrap();
        h.provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap();
        assert_eq!(h.notifier.sent()[1].code, "5555");
        assert!(h.provisioner.verify(&mut form, "4321").await.is_err());
        h.provisioner.verify(&mut form, "5555").await.unwrap();
    }

    #[tokio::test]
    async fn dispatch_failure_reverts_to_idle() {
        let store = Arc::new(MemoryAccountStore::new());
        store.seed("Ann", "a@x.com", Role::Admin, AccountStatus::Active).await;
        let provisioner = Provisioner::new(
            store.clone(),
            Arc::new(FailingNotifier),
            Arc::new(FixedCodes::new(["4321"])),
            OtpPolicy::default(),
        );
        let mut form = provisioner.open_form().await;

        let err = provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Dispatch(_)));
        assert_eq!(err.notice(), "Failed to send OTP. Please try again.");
        assert_eq!(form.state.name(), "idle");
        assert!(matches!(
            provisioner.verify(&mut form, "4321").await,
            Err(WorkflowError::NoCodeRequested)
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn lookup_failure_surfaces_notice() {
        let provisioner = Provisioner::new(
            Arc::new(UnavailableStore),
            Arc::new(RecordingNotifier::new()),
            Arc::new(FixedCodes::new(["4321"])),
            OtpPolicy::default(),
        );
        let mut form = provisioner.open_form().await;
        assert_eq!(form.mode, FormMode::Normal);
        assert!(form.notice.is_some());

        let err = provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Lookup(_)));
    }

    #[tokio::test]
    async fn existing_candidate_is_rejected_before_code() {
        let h = harness().await;
        h.store.seed("Bob", "B@x.com", Role::User, AccountStatus::Inactive).await;
        let mut form = h.provisioner.open_form().await;
        let err = h.provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::CandidateExists(_)));
        assert_eq!(h.codes.issued(), 0);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let h = harness().await;
        let mut form = h.provisioner.open_form().await;
        let mut request = bob("a@x.com");
        request.name = "  ".into();
        assert!(matches!(
            h.provisioner.request_approval(&mut form, request).await,
            Err(WorkflowError::InvalidInput(_))
        ));
        let mut request = bob("a@x.com");
        request.email = "not-an-email".into();
        assert!(matches!(
            h.provisioner.request_approval(&mut form, request).await,
            Err(WorkflowError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn candidate_role_is_kept() {
        let h = harness().await;
        let mut form = h.provisioner.open_form().await;
        let mut request = bob("a@x.com");
        request.role = Role::Candidate;
        h.provisioner.request_approval(&mut form, request).await.unwrap();
        let account = h.provisioner.verify(&mut form, "4321").await.unwrap();
        assert_eq!(account.role, Role::Candidate);
        assert_eq!(account.status, AccountStatus::Inactive);
    }

    #[tokio::test]
    async fn verified_form_cannot_be_reused() {
        let h = harness().await;
        let mut form = h.provisioner.open_form().await;
        h.provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap();
        h.provisioner.verify(&mut form, "4321").await.unwrap();

        assert!(matches!(
            h.provisioner.verify(&mut form, "4321").await,
            Err(WorkflowError::Completed)
        ));
        assert!(matches!(
            h.provisioner.request_approval(&mut form, bob("a@x.com")).await,
            Err(WorkflowError::Completed)
        ));
        assert_eq!(h.store.len().await, 2);
    }

    #[tokio::test]
    async fn attempt_limit_resets_form() {
        let store = Arc::new(MemoryAccountStore::new());
        store.seed("Ann", "a@x.com", Role::Admin, AccountStatus::Active).await;
        let h = harness_with(
            store,
            OtpPolicy {
                expiry: None,
                max_attempts: Some(2),
            },
        );
        let mut form = h.provisioner.open_form().await;
        h.provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap();

        let err = h.provisioner.verify(&mut form, "0000").await.unwrap_err();
        assert!(matches!(err, WorkflowError::CodeMismatch { attempts_remaining: Some(1) }));
        let err = h.provisioner.verify(&mut form, "0000").await.unwrap_err();
        assert!(matches!(err, WorkflowError::AttemptsExhausted));
        assert_eq!(form.state.name(), "idle");
        assert!(matches!(
            h.provisioner.verify(&mut form, "4321").await,
            Err(WorkflowError::NoCodeRequested)
        ));
    }

    #[tokio::test]
    async fn expired_code_is_refused() {
        let store = Arc::new(MemoryAccountStore::new());
        store.seed("Ann", "a@x.com", Role::Admin, AccountStatus::Active).await;
        let h = harness_with(
            store,
            OtpPolicy {
                expiry: Some(Duration::ZERO),
                max_attempts: None,
            },
        );
        let mut form = h.provisioner.open_form().await;
        h.provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap();

        let err = h.provisioner.verify(&mut form, "4321").await.unwrap_err();
        assert!(matches!(err, WorkflowError::CodeExpired));
        assert_eq!(form.state.name(), "idle");
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn first_admin_mode_creates_one_active_admin_without_code() {
        let h = harness_with(Arc::new(MemoryAccountStore::new()), OtpPolicy::default());
        let mut form = h.provisioner.open_form().await;
        assert_eq!(form.mode, FormMode::FirstAdmin);
        assert_eq!(form.default_role(), Role::Admin);
        assert!(form.status().role_locked);

        let account = h
            .provisioner
            .register_first_admin(&mut form, "Root", "Root@X.com")
            .await
            .unwrap();
        assert_eq!(account.role, Role::Admin);
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.email, "root@x.com");
        assert_eq!(h.store.len().await, 1);
        assert_eq!(h.codes.issued(), 0);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn first_admin_mode_refuses_otp_path() {
        let h = harness_with(Arc::new(MemoryAccountStore::new()), OtpPolicy::default());
        let mut form = h.provisioner.open_form().await;
        assert!(matches!(
            h.provisioner.request_approval(&mut form, bob("a@x.com")).await,
            Err(WorkflowError::FirstAdminMode)
        ));
    }

    #[tokio::test]
    async fn normal_mode_refuses_first_admin_path() {
        let h = harness().await;
        let mut form = h.provisioner.open_form().await;
        assert!(matches!(
            h.provisioner.register_first_admin(&mut form, "Eve", "e@x.com").await,
            Err(WorkflowError::NotFirstAdminMode)
        ));
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn bootstrap_closes_when_admin_appears_after_detection() {
        let h = harness_with(Arc::new(MemoryAccountStore::new()), OtpPolicy::default());
        let mut first = h.provisioner.open_form().await;
        let mut second = h.provisioner.open_form().await;

        h.provisioner.register_first_admin(&mut first, "Ann", "a@x.com").await.unwrap();
        let err = h
            .provisioner
            .register_first_admin(&mut second, "Eve", "e@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::BootstrapClosed));
        assert_eq!(second.mode, FormMode::Normal);
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_first_admin_submissions_create_one_admin() {
        let store = Arc::new(YieldingStore::new());
        let provisioner = Provisioner::new(
            store.clone(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(FixedCodes::new(["4321"])),
            OtpPolicy::default(),
        );
        let mut first = provisioner.open_form().await;
        let mut second = provisioner.open_form().await;
        assert_eq!(first.mode, FormMode::FirstAdmin);
        assert_eq!(second.mode, FormMode::FirstAdmin);

        let (a, b) = tokio::join!(
            provisioner.register_first_admin(&mut first, "Ann", "a@x.com"),
            provisioner.register_first_admin(&mut second, "Eve", "e@x.com"),
        );
        assert_eq!(a.is_ok() as usize + b.is_ok() as usize, 1);
        let err = a.err().or(b.err()).unwrap();
        assert!(matches!(err, WorkflowError::BootstrapClosed));

        let admins = store.inner.find_by_role(Role::Admin).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert!(admins[0].is_active());
    }

    #[tokio::test]
    async fn status_never_exposes_code() {
        let h = harness().await;
        let mut form = h.provisioner.open_form().await;
        h.provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap();
        let rendered = serde_json::to_string(&form.status()).unwrap();
        assert!(!rendered.contains("4321"));
        assert!(rendered.contains("otp_requested"));
        assert!(!format!("{:?}", form).contains("4321"));
    }

    #[tokio::test]
    async fn persistence_failure_keeps_code_for_retry() {
        let store = Arc::new(ReadOnlySwitchStore::new());
        store.inner.seed("Ann", "a@x.com", Role::Admin, AccountStatus::Active).await;
        let provisioner = Provisioner::new(
            store.clone(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(FixedCodes::new(["4321"])),
            OtpPolicy::default(),
        );
        let mut form = provisioner.open_form().await;
        provisioner.request_approval(&mut form, bob("a@x.com")).await.unwrap();

        store.fail_writes(true);
        let err = provisioner.verify(&mut form, "4321").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Store(_)));
        assert_eq!(err.notice(), "Failed to save user data. Please try again.");
        assert_eq!(form.state.name(), "otp_requested");

        store.fail_writes(false);
        provisioner.verify(&mut form, "4321").await.unwrap();
        assert_eq!(store.inner.len().await, 2);
    }
}
