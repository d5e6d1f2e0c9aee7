use thiserror::Error;

use crate::database::StoreError;
use crate::notify::NotifyError;

/// Provisioning failures, each carrying the notice shown to the submitter
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Approver '{0}' not found")]
    ApproverNotFound(String),

    #[error("Approver '{0}' is not an admin")]
    ApproverNotAdmin(String),

    #[error("Account '{0}' already exists")]
    CandidateExists(String),

    #[error("An approval code is already outstanding for this form")]
    AlreadyRequested,

    #[error("No approval code has been requested")]
    NoCodeRequested,

    #[error("Approval code mismatch")]
    CodeMismatch { attempts_remaining: Option<u32> },

    #[error("Approval code expired")]
    CodeExpired,

    #[error("Approval code attempts exhausted")]
    AttemptsExhausted,

    #[error("Form is in first-admin mode")]
    FirstAdminMode,

    #[error("Form is not in first-admin mode")]
    NotFirstAdminMode,

    #[error("An admin account already exists")]
    BootstrapClosed,

    #[error("Form already completed")]
    Completed,

    #[error("Approval code dispatch failed: {0}")]
    Dispatch(#[source] NotifyError),

    #[error("Account lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("Account store error: {0}")]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// User-facing notice for the form
    pub fn notice(&self) -> String {
        match self {
            WorkflowError::InvalidInput(msg) => msg.clone(),
            WorkflowError::ApproverNotFound(_) => "Admin email not found in the database.".to_string(),
            WorkflowError::ApproverNotAdmin(_) => {
                "Action not allowed. Admin email is not registered with role=admin.".to_string()
            }
            WorkflowError::CandidateExists(email) => format!("An account for {} already exists.", email),
            WorkflowError::AlreadyRequested => {
                "An OTP has already been sent for this form. Enter it or cancel to start over.".to_string()
            }
            WorkflowError::NoCodeRequested => "Request an OTP before verifying.".to_string(),
            WorkflowError::CodeMismatch { attempts_remaining: Some(n) } => {
                format!("Invalid OTP. Please try again ({} attempts left).", n)
            }
            WorkflowError::CodeMismatch { attempts_remaining: None } => "Invalid OTP. Please try again.".to_string(),
            WorkflowError::CodeExpired => "OTP expired. Please request a new one.".to_string(),
            WorkflowError::AttemptsExhausted => "Too many invalid OTP attempts. Please request a new one.".to_string(),
            WorkflowError::FirstAdminMode => "No admin exists yet. Register the first admin instead.".to_string(),
            WorkflowError::NotFirstAdminMode => "An admin already exists. Request admin approval instead.".to_string(),
            WorkflowError::BootstrapClosed => {
                "An admin was registered in the meantime. Request admin approval instead.".to_string()
            }
            WorkflowError::Completed => "This form has already been completed.".to_string(),
            WorkflowError::Dispatch(_) | WorkflowError::Lookup(_) => {
                "Failed to send OTP. Please try again.".to_string()
            }
            WorkflowError::Store(StoreError::Conflict(msg)) => msg.clone(),
            WorkflowError::Store(_) => "Failed to save user data. Please try again.".to_string(),
        }
    }
}
