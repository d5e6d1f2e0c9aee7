//! Explicit login session derived from the identity service's bearer token.
//!
//! Tokens are issued elsewhere and signed with the shared `JWT_SECRET`; this
//! module only validates them and tracks logouts for the server's lifetime.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::types::normalize_email;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

// Signing belongs to the identity service; only test builds mint tokens
#[cfg(any(test, feature = "testing"))]
impl Claims {
    pub fn new(email: &str, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: normalize_email(email),
            email: normalize_email(email),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn sign(&self, secret: &str) -> Result<String, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::SecretMissing);
        }
        use jsonwebtoken::{encode, EncodingKey, Header};

        encode(&Header::default(), self, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|e| AuthError::Invalid(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingToken,

    #[error("{0}")]
    Malformed(String),

    #[error("Invalid session token: {0}")]
    Invalid(String),

    #[error("Session secret not configured")]
    SecretMissing,

    #[error("Session has been logged out")]
    Revoked,
}

/// The signed-in user, injected into each protected request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    pub fingerprint: String,
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

/// SHA-256 of the raw token; revocation is tracked by fingerprint, not token
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validate a bearer token and build the session it represents
pub fn decode_session(token: &str, secret: &str) -> Result<Session, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::SecretMissing);
    }

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map_err(|e| AuthError::Invalid(e.to_string()))?;

    let email = normalize_email(&data.claims.email);
    if email.is_empty() {
        return Err(AuthError::Invalid("token carries no email".to_string()));
    }

    Ok(Session {
        email,
        issued_at: timestamp(data.claims.iat),
        expires_at: timestamp(data.claims.exp),
        fingerprint: fingerprint(token),
    })
}

/// Extract the token from an `Authorization: Bearer ...` value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingToken)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::Malformed("Authorization header must use Bearer token format".to_string()))?
        .trim();
    if token.is_empty() {
        return Err(AuthError::Malformed("Empty session token".to_string()));
    }
    Ok(token)
}

/// Logged-out sessions. Created with the application state at startup and
/// consulted on every protected request.
#[derive(Default)]
pub struct SessionRegistry {
    revoked: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_revoked(&self, session: &Session) -> bool {
        self.revoked.read().await.contains_key(&session.fingerprint)
    }

    /// Revoke a session until its natural expiry
    pub async fn logout(&self, session: &Session) {
        let now = Utc::now();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, expires_at| *expires_at > now);
        revoked.insert(session.fingerprint.clone(), session.expires_at);
        tracing::info!("Session for {} logged out", session.email);
    }
}
