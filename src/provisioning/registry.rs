use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::workflow::ProvisioningForm;

pub type FormHandle = Arc<Mutex<ProvisioningForm>>;

/// Open provisioning forms, one per browser session.
///
/// Each form sits behind its own mutex; callers use `try_lock` so a second
/// operation on a busy form is refused instead of queued.
pub struct FormRegistry {
    forms: RwLock<HashMap<Uuid, FormHandle>>,
    ttl: Duration,
}

impl FormRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            forms: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn insert(&self, form: ProvisioningForm) -> FormHandle {
        let id = form.id;
        let handle = Arc::new(Mutex::new(form));
        self.forms.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, id: Uuid) -> Option<FormHandle> {
        self.forms.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.forms.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.forms.read().await.len()
    }

    /// Drop forms older than the TTL. Forms currently locked are left alone.
    pub async fn purge_stale(&self) -> usize {
        let mut forms = self.forms.write().await;
        let before = forms.len();
        forms.retain(|_, handle| match handle.try_lock() {
            Ok(form) => form.opened_at.elapsed() < self.ttl,
            Err(_) => true,
        });
        let purged = before - forms.len();
        if purged > 0 {
            debug!("Purged {} stale provisioning forms", purged);
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryAccountStore;
    use crate::provisioning::{OtpPolicy, Provisioner};
    use crate::testing::{FixedCodes, RecordingNotifier};

    fn provisioner() -> Provisioner {
        Provisioner::new(
            Arc::new(MemoryAccountStore::new()),
            Arc::new(RecordingNotifier::new()),
            Arc::new(FixedCodes::new(["4321"])),
            OtpPolicy::default(),
        )
    }

    #[tokio::test]
    async fn insert_get_remove() {
        let registry = FormRegistry::new(Duration::from_secs(60));
        let form = provisioner().open_form().await;
        let id = form.id;

        registry.insert(form).await;
        assert!(registry.get(id).await.is_some());
        assert!(registry.remove(id).await);
        assert!(registry.get(id).await.is_none());
        assert!(!registry.remove(id).await);
    }

    #[tokio::test]
    async fn busy_form_refuses_second_lock() {
        let registry = FormRegistry::new(Duration::from_secs(60));
        let handle = registry.insert(provisioner().open_form().await).await;

        let _guard = handle.try_lock().unwrap();
        assert!(handle.try_lock().is_err());
    }

    #[tokio::test]
    async fn purge_removes_only_expired_unlocked_forms() {
        let registry = FormRegistry::new(Duration::ZERO);
        let p = provisioner();
        registry.insert(p.open_form().await).await;
        let busy = registry.insert(p.open_form().await).await;

        let _guard = busy.lock().await;
        assert_eq!(registry.purge_stale().await, 1);
        assert_eq!(registry.len().await, 1);
    }
}
