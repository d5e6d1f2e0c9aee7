use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::SessionRegistry;
use crate::config::{AppConfig, Environment, StoreBackend};
use crate::database::{
    AccountStore, DatabaseError, DatabaseManager, MemoryAccountStore, PgAccountStore,
};
use crate::notify::{HttpNotifier, LogNotifier, Notifier, NotifyError};
use crate::provisioning::{CodeGenerator, FormRegistry, OtpPolicy, Provisioner, RandomCodes};
use crate::services::AccountService;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Mail service not configured: {0}")]
    Notifier(#[from] NotifyError),

    #[error("JWT_SECRET must be set outside development")]
    SecretMissing,
}

/// Shared handles for every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AccountStore>,
    pub provisioner: Arc<Provisioner>,
    pub forms: Arc<FormRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub accounts: Arc<AccountService>,
}

impl AppState {
    /// Assemble state around explicit collaborators
    pub fn new(
        config: AppConfig,
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        let provisioner = Provisioner::new(
            store.clone(),
            notifier,
            codes,
            OtpPolicy::from(&config.otp),
        );
        let forms = FormRegistry::new(Duration::from_secs(config.otp.form_ttl_secs));
        let accounts = AccountService::new(
            store.clone(),
            config.security.page_size,
            config.security.max_page_size,
        );

        Self {
            config: Arc::new(config),
            store,
            provisioner: Arc::new(provisioner),
            forms: Arc::new(forms),
            sessions: Arc::new(SessionRegistry::new()),
            accounts: Arc::new(accounts),
        }
    }

    /// Build production collaborators from configuration
    pub async fn from_config(config: AppConfig) -> Result<Self, StartupError> {
        if config.security.jwt_secret.is_empty() {
            return Err(StartupError::SecretMissing);
        }

        let store = open_store(&config).await?;
        let notifier = build_notifier(&config)?;
        Ok(Self::new(config, store, notifier, Arc::new(RandomCodes)))
    }
}

/// Open the configured account store backend
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn AccountStore>, DatabaseError> {
    match config.store.backend {
        StoreBackend::Postgres => {
            let pool = DatabaseManager::connect(&config.store).await?;
            DatabaseManager::ensure_schema(&pool).await?;
            Ok(Arc::new(PgAccountStore::new(pool)))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory account store; accounts are lost on restart");
            Ok(Arc::new(MemoryAccountStore::new()))
        }
    }
}

fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    if config.notify.is_configured() {
        info!("Approval codes will be mailed via {}", config.notify.endpoint);
        return Ok(Arc::new(HttpNotifier::from_config(&config.notify)?));
    }
    match config.environment {
        Environment::Development => {
            warn!("Mail service not configured; approval codes will be logged");
            Ok(Arc::new(LogNotifier))
        }
        _ => Err(NotifyError::NotConfigured("NOTIFY_SERVICE_ID")),
    }
}
