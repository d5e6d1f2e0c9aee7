use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::database::AccountStore;
use crate::types::Role;

/// Which submission path a provisioning form uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormMode {
    /// OTP-gated provisioning through a nominated admin
    Normal,
    /// No admin exists yet; the submitter becomes the first, active admin
    FirstAdmin,
}

impl Default for FormMode {
    fn default() -> Self {
        FormMode::Normal
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub mode: FormMode,
    pub notice: Option<String>,
}

pub const ADMIN_CHECK_FAILED: &str = "Failed to verify admin status. Please try again.";

/// Decides once per form whether the first-admin path is open
pub struct BootstrapDetector {
    store: Arc<dyn AccountStore>,
}

impl BootstrapDetector {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// An unknown admin population resolves to `Normal`, never to `FirstAdmin`.
    pub async fn detect(&self) -> Detection {
        match self.store.any_with_role(Role::Admin).await {
            Ok(true) => Detection {
                mode: FormMode::Normal,
                notice: None,
            },
            Ok(false) => {
                info!("No admin account exists; provisioning form opens in first-admin mode");
                Detection {
                    mode: FormMode::FirstAdmin,
                    notice: None,
                }
            }
            Err(e) => {
                error!("Error checking for admins: {}", e);
                Detection {
                    mode: FormMode::Normal,
                    notice: Some(ADMIN_CHECK_FAILED.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryAccountStore;
    use crate::testing::UnavailableStore;
    use crate::types::AccountStatus;

    #[tokio::test]
    async fn empty_store_opens_first_admin_mode() {
        let store = Arc::new(MemoryAccountStore::new());
        let detection = BootstrapDetector::new(store).detect().await;
        assert_eq!(detection.mode, FormMode::FirstAdmin);
        assert_eq!(detection.notice, None);
    }

    #[tokio::test]
    async fn non_admin_accounts_do_not_close_bootstrap() {
        let store = Arc::new(MemoryAccountStore::new());
        store.seed("Cat", "c@x.com", Role::Candidate, AccountStatus::Active).await;
        let detection = BootstrapDetector::new(store).detect().await;
        assert_eq!(detection.mode, FormMode::FirstAdmin);
    }

    #[tokio::test]
    async fn existing_admin_means_normal_mode() {
        let store = Arc::new(MemoryAccountStore::new());
        store.seed("Ann", "a@x.com", Role::Admin, AccountStatus::Active).await;
        let detection = BootstrapDetector::new(store).detect().await;
        assert_eq!(detection.mode, FormMode::Normal);
    }

    #[tokio::test]
    async fn store_failure_falls_back_to_normal_with_notice() {
        let detection = BootstrapDetector::new(Arc::new(UnavailableStore)).detect().await;
        assert_eq!(detection.mode, FormMode::Normal);
        assert_eq!(detection.notice.as_deref(), Some(ADMIN_CHECK_FAILED));
    }

    #[test]
    fn mode_serializes_kebab_case() {
        assert_eq!(serde_json::to_value(FormMode::FirstAdmin).unwrap(), "first-admin");
    }
}
