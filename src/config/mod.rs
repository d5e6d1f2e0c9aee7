use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub otp: OtpConfig,
    pub notify: NotifyConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    /// None keeps a code valid until it is verified or the form is discarded
    pub expiry_secs: Option<u64>,
    /// None allows unlimited verification attempts per code
    pub max_attempts: Option<u32>,
    pub form_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub endpoint: String,
    pub service_id: Option<String>,
    pub template_id: Option<String>,
    pub public_key: Option<String>,
    pub timeout_secs: u64,
}

impl NotifyConfig {
    pub fn is_configured(&self) -> bool {
        [&self.service_id, &self.template_id, &self.public_key]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
    pub page_size: usize,
    pub max_page_size: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("RBAC_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Store overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            match v.trim().to_ascii_lowercase().as_str() {
                "memory" => self.store.backend = StoreBackend::Memory,
                "postgres" | "pg" => self.store.backend = StoreBackend::Postgres,
                other => tracing::warn!("Ignoring unknown STORE_BACKEND '{}'", other),
            }
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.store.connection_timeout_secs = v.parse().unwrap_or(self.store.connection_timeout_secs);
        }

        // OTP overrides ("none" or "0" disables a limit)
        if let Ok(v) = env::var("OTP_EXPIRY_SECS") {
            self.otp.expiry_secs = v.parse().ok().filter(|n| *n > 0);
        }
        if let Ok(v) = env::var("OTP_MAX_ATTEMPTS") {
            self.otp.max_attempts = v.parse().ok().filter(|n| *n > 0);
        }
        if let Ok(v) = env::var("OTP_FORM_TTL_SECS") {
            self.otp.form_ttl_secs = v.parse().unwrap_or(self.otp.form_ttl_secs);
        }

        // Notification overrides
        if let Ok(v) = env::var("NOTIFY_ENDPOINT") {
            self.notify.endpoint = v;
        }
        if let Ok(v) = env::var("NOTIFY_SERVICE_ID") {
            self.notify.service_id = Some(v);
        }
        if let Ok(v) = env::var("NOTIFY_TEMPLATE_ID") {
            self.notify.template_id = Some(v);
        }
        if let Ok(v) = env::var("NOTIFY_PUBLIC_KEY") {
            self.notify.public_key = Some(v);
        }
        if let Ok(v) = env::var("NOTIFY_TIMEOUT_SECS") {
            self.notify.timeout_secs = v.parse().unwrap_or(self.notify.timeout_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_PAGE_SIZE") {
            self.security.page_size = v.parse().unwrap_or(self.security.page_size);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 10,
                connection_timeout_secs: 30,
            },
            otp: OtpConfig {
                expiry_secs: None,
                max_attempts: None,
                form_ttl_secs: 60 * 60,
            },
            notify: NotifyConfig {
                endpoint: "https://api.emailjs.com/api/v1.0/email/send".to_string(),
                service_id: None,
                template_id: None,
                public_key: None,
                timeout_secs: 10,
            },
            security: SecurityConfig {
                jwt_secret: "development-secret-change-me".to_string(),
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                page_size: 5,
                max_page_size: 100,
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.store.max_connections = 20;
        config.store.connection_timeout_secs = 10;
        config.otp = OtpConfig {
            expiry_secs: Some(15 * 60),
            max_attempts: Some(5),
            form_ttl_secs: 30 * 60,
        };
        config.security.jwt_secret = String::new();
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.store.max_connections = 50;
        config.store.connection_timeout_secs = 5;
        config.otp = OtpConfig {
            expiry_secs: Some(10 * 60),
            max_attempts: Some(5),
            form_ttl_secs: 15 * 60,
        };
        config.security.jwt_secret = String::new();
        config.security.cors_origins = vec!["https://app.example.com".to_string()];
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
