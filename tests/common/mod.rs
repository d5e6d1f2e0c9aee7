#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use rbac_console::config::{AppConfig, StoreBackend};
use rbac_console::database::{Account, MemoryAccountStore};
use rbac_console::testing::{mint_token, FixedCodes, RecordingNotifier};
use rbac_console::types::{AccountStatus, Role};
use rbac_console::{app, AppState};

pub const SECRET: &str = "integration-secret";

/// In-process server on a free port, backed by the memory store
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
    pub store: Arc<MemoryAccountStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub client: reqwest::Client,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.store.backend = StoreBackend::Memory;
    config.security.jwt_secret = SECRET.to_string();
    config
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(test_config()).await
    }

    pub async fn start_with(config: AppConfig) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let store = Arc::new(MemoryAccountStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let codes = Arc::new(FixedCodes::new(["4321", "5678", "9012"]));
        let state = AppState::new(config, store.clone(), notifier.clone(), codes);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;
        let router = app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self {
            port,
            base_url,
            state,
            store,
            notifier,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, email: &str) -> String {
        mint_token(SECRET, email)
    }

    pub async fn seed_admin(&self, name: &str, email: &str) -> Account {
        self.store.seed(name, email, Role::Admin, AccountStatus::Active).await
    }

    pub async fn seed_user(&self, name: &str, email: &str, status: AccountStatus) -> Account {
        self.store.seed(name, email, Role::User, status).await
    }

    /// Opens a provisioning form and returns its id and status body
    pub async fn open_form(&self) -> Result<(String, Value)> {
        let res = self.client.post(self.url("/api/provision")).send().await?;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await?;
        let id = body["data"]["id"].as_str().context("form id missing")?.to_string();
        Ok((id, body["data"].clone()))
    }

    pub async fn post_json(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        let res = self.client.post(self.url(path)).json(&body).send().await?;
        let status = res.status();
        Ok((status, res.json().await?))
    }

    pub async fn request_approval(&self, form: &str, approver: &str) -> Result<(StatusCode, Value)> {
        self.post_json(
            &format!("/api/provision/{}/request", form),
            json!({
                "name": "Bob",
                "email": "bob@x.com",
                "role": "user",
                "approver_email": approver
            }),
        )
        .await
    }
}
