use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{ApprovalCodeMessage, NotifyError, Notifier};
use crate::config::NotifyConfig;

#[derive(Debug, Serialize)]
struct TemplateParams<'a> {
    admin_email: &'a str,
    otp: &'a str,
}

#[derive(Debug, Serialize)]
struct SendTemplateBody<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams<'a>,
}

/// Sends approval codes through a hosted template-mail HTTP API
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
    service_id: String,
    template_id: String,
    public_key: String,
}

fn require(value: &Option<String>, key: &'static str) -> Result<String, NotifyError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(NotifyError::NotConfigured(key)),
    }
}

impl HttpNotifier {
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("rbac-console/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            service_id: require(&config.service_id, "NOTIFY_SERVICE_ID")?,
            template_id: require(&config.template_id, "NOTIFY_TEMPLATE_ID")?,
            public_key: require(&config.public_key, "NOTIFY_PUBLIC_KEY")?,
        })
    }

    fn body<'a>(&'a self, message: &'a ApprovalCodeMessage) -> SendTemplateBody<'a> {
        SendTemplateBody {
            service_id: &self.service_id,
            template_id: &self.template_id,
            user_id: &self.public_key,
            template_params: TemplateParams {
                admin_email: &message.recipient,
                otp: &message.code,
            },
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_approval_code(&self, message: &ApprovalCodeMessage) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&self.body(message))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!("Approval code delivered to mail service for {}", message.recipient);
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn configured() -> NotifyConfig {
        let mut config = AppConfig::development().notify;
        config.service_id = Some("service_1".into());
        config.template_id = Some("template_1".into());
        config.public_key = Some("public_1".into());
        config
    }

    #[test]
    fn from_config_requires_credentials() {
        let config = AppConfig::development().notify;
        let err = HttpNotifier::from_config(&config).unwrap_err();
        assert!(matches!(err, NotifyError::NotConfigured("NOTIFY_SERVICE_ID")));
    }

    #[test]
    fn body_carries_recipient_and_code() {
        let notifier = HttpNotifier::from_config(&configured()).unwrap();
        let message = ApprovalCodeMessage {
            recipient: "a@x.com".into(),
            code: "4321".into(),
        };
        let value = serde_json::to_value(notifier.body(&message)).unwrap();
        assert_eq!(value["service_id"], "service_1");
        assert_eq!(value["user_id"], "public_1");
        assert_eq!(value["template_params"]["admin_email"], "a@x.com");
        assert_eq!(value["template_params"]["otp"], "4321");
    }
}
