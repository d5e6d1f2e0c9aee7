//! Out-of-band delivery of approval codes to the nominated admin.

pub mod http;
pub mod log;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub use self::http::HttpNotifier;
pub use self::log::LogNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel is not configured: {0} is required")]
    NotConfigured(&'static str),

    #[error("Notification rejected (status={status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Notification transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Templated message carrying a one-time approval code
#[derive(Clone, PartialEq, Eq)]
pub struct ApprovalCodeMessage {
    pub recipient: String,
    pub code: String,
}

// Keeps the code out of Debug output and therefore out of logs
impl fmt::Debug for ApprovalCodeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalCodeMessage")
            .field("recipient", &self.recipient)
            .field("code", &"****")
            .finish()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_approval_code(&self, message: &ApprovalCodeMessage) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_masks_code() {
        let message = ApprovalCodeMessage {
            recipient: "a@x.com".into(),
            code: "4321".into(),
        };
        let rendered = format!("{:?}", message);
        assert!(rendered.contains("a@x.com"));
        assert!(!rendered.contains("4321"));
    }
}
