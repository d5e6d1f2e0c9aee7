use rand::Rng;
use std::time::{Duration, Instant};

use crate::config::OtpConfig;

/// Inclusive bounds of the four-digit approval code
pub const CODE_MIN: u32 = 1000;
pub const CODE_MAX: u32 = 9999;

/// Source of one-time approval codes
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform draw from `CODE_MIN..=CODE_MAX`
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn generate(&self) -> String {
        rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
    }
}

/// Limits applied to an issued code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OtpPolicy {
    pub expiry: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl From<&OtpConfig> for OtpPolicy {
    fn from(config: &OtpConfig) -> Self {
        Self {
            expiry: config.expiry_secs.map(Duration::from_secs),
            max_attempts: config.max_attempts,
        }
    }
}

/// An issued code together with its bookkeeping. Lives only in form memory.
#[derive(Clone)]
pub struct PendingCode {
    code: String,
    pub approver: String,
    pub issued_at: Instant,
    pub failed_attempts: u32,
}

impl PendingCode {
    pub fn new(code: String, approver: String) -> Self {
        Self {
            code,
            approver,
            issued_at: Instant::now(),
            failed_attempts: 0,
        }
    }

    /// Exact string comparison; no trimming or case folding
    pub fn matches(&self, submitted: &str) -> bool {
        self.code == submitted
    }

    pub fn is_expired(&self, policy: &OtpPolicy) -> bool {
        policy
            .expiry
            .is_some_and(|expiry| self.issued_at.elapsed() >= expiry)
    }

    /// Attempts left under the policy, or None when unlimited
    pub fn attempts_remaining(&self, policy: &OtpPolicy) -> Option<u32> {
        policy
            .max_attempts
            .map(|max| max.saturating_sub(self.failed_attempts))
    }
}

impl std::fmt::Debug for PendingCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCode")
            .field("approver", &self.approver)
            .field("failed_attempts", &self.failed_attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_codes_are_four_digits_in_range() {
        let codes = RandomCodes;
        for _ in 0..2_000 {
            let code = codes.generate();
            assert_eq!(code.len(), 4, "code {code}");
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            let n: u32 = code.parse().unwrap();
            assert!((CODE_MIN..=CODE_MAX).contains(&n));
        }
    }

    #[test]
    fn matching_is_exact() {
        let pending = PendingCode::new("4321".into(), "a@x.com".into());
        assert!(pending.matches("4321"));
        assert!(!pending.matches(" 4321"));
        assert!(!pending.matches("04321"));
        assert!(!pending.matches("1234"));
    }

    #[test]
    fn no_policy_never_expires() {
        let pending = PendingCode::new("4321".into(), "a@x.com".into());
        let policy = OtpPolicy::default();
        assert!(!pending.is_expired(&policy));
        assert_eq!(pending.attempts_remaining(&policy), None);
    }

    #[test]
    fn zero_expiry_is_immediately_expired() {
        let pending = PendingCode::new("4321".into(), "a@x.com".into());
        let policy = OtpPolicy {
            expiry: Some(Duration::ZERO),
            max_attempts: Some(3),
        };
        assert!(pending.is_expired(&policy));
        assert_eq!(pending.attempts_remaining(&policy), Some(3));
    }

    #[test]
    fn debug_hides_code() {
        let pending = PendingCode::new("4321".into(), "a@x.com".into());
        assert!(!format!("{:?}", pending).contains("4321"));
    }
}
