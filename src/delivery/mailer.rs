//! # Mail Collaborator
//!
//! A single "send message with optional attachments" operation. [`HttpMailer`] posts
//! to a JSON mail-relay API with base64-encoded attachments.

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Url};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DeliveryConfig;
use crate::error::{FulfillmentError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

#[derive(Serialize)]
struct RelayAttachment {
    filename: String,
    content: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    attachments: Vec<RelayAttachment>,
}

#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    endpoint: Url,
    api_key: String,
    from_address: String,
}

impl std::fmt::Debug for HttpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMailer")
            .field("endpoint", &self.endpoint.as_str())
            .field("from_address", &self.from_address)
            .field("api_key_set", &!self.api_key.is_empty())
            .finish()
    }
}

impl HttpMailer {
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.mail_api_url).map_err(|e| {
            FulfillmentError::Configuration(format!("Invalid mail API URL: {e}"))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(format!("fulfillment-worker/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                FulfillmentError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        info!(endpoint = %endpoint, "Created mail relay client");
        Ok(Self {
            client,
            endpoint,
            api_key: config.mail_api_key.clone(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let mut attachments = Vec::with_capacity(message.attachments.len());
        for attachment in &message.attachments {
            let bytes = tokio::fs::read(&attachment.path).await?;
            attachments.push(RelayAttachment {
                filename: attachment.filename.clone(),
                content: base64::engine::general_purpose::STANDARD.encode(bytes),
            });
        }

        let body = RelayMessage {
            from: &self.from_address,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
            attachments,
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FulfillmentError::Mail(format!("Mail relay request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FulfillmentError::Mail(format!(
                "Mail relay returned {status}: {detail}"
            )));
        }

        debug!(
            to = %message.to,
            subject = %message.subject,
            attachments = message.attachments.len(),
            "Email sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_endpoint() {
        let config = DeliveryConfig {
            mail_api_url: "not a url".to_string(),
            ..DeliveryConfig::default()
        };
        let err = HttpMailer::new(&config).unwrap_err();
        assert!(matches!(err, FulfillmentError::Configuration(_)));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = DeliveryConfig {
            mail_api_key: "secret".to_string(),
            ..DeliveryConfig::default()
        };
        let mailer = HttpMailer::new(&config).unwrap();
        let debug = format!("{mailer:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("api_key_set: true"));
    }
}
