use async_trait::async_trait;
use tracing::info;

use super::{ApprovalCodeMessage, NotifyError, Notifier};

/// Development stand-in for the mail service: writes the code to the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_approval_code(&self, message: &ApprovalCodeMessage) -> Result<(), NotifyError> {
        info!(
            recipient = %message.recipient,
            code = %message.code,
            "Approval code issued (log notifier, development only)"
        );
        Ok(())
    }
}
