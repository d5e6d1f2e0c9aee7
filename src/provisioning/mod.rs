//! Account provisioning: first-admin bootstrap and OTP-gated admin approval.

pub mod bootstrap;
pub mod error;
pub mod otp;
pub mod registry;
pub mod workflow;

pub use bootstrap::{BootstrapDetector, Detection, FormMode};
pub use error::WorkflowError;
pub use otp::{CodeGenerator, OtpPolicy, PendingCode, RandomCodes};
pub use registry::{FormHandle, FormRegistry};
pub use workflow::{ApprovalRequest, Candidate, FormStatus, ProvisioningForm, Provisioner, WorkflowState};

/// Client route to navigate to once an account has been created
pub const MANAGEMENT_ROUTE: &str = "/userManagement";
