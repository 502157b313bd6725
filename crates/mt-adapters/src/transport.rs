use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use mt_core::error::TransportError;
use mt_core::ports::{MailTransport, OutboundEmail};

/// Configuration for the outbound mail relay client.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl RelayConfig {
    pub fn new(endpoint: String, api_key: String, timeout_ms: u64) -> Self {
        Self {
            endpoint,
            api_key,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<RelayAttachment<'a>>,
}

#[derive(Serialize)]
struct RelayAttachment<'a> {
    filename: &'a str,
    content_base64: String,
}

/// Client for the HTTP mail relay that performs the actual SMTP delivery.
pub struct HttpMailRelay {
    config: RelayConfig,
    http: reqwest::Client,
}

impl HttpMailRelay {
    pub fn new(config: RelayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build mail relay http client")?;
        Ok(Self { config, http })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Rejected(e.to_string())
    }
}

#[async_trait]
impl MailTransport for HttpMailRelay {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        let attachment = email.attachment.as_ref().map(|a| RelayAttachment {
            filename: &a.filename,
            content_base64: base64::engine::general_purpose::STANDARD.encode(&a.content),
        });
        let message = RelayMessage {
            to: email.to.as_str(),
            subject: &email.subject,
            html: &email.html_body,
            attachment,
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&message)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, recipient = email.to.as_str(), "relay rejected message");
            return Err(TransportError::Rejected(format!("status {status}: {body}")));
        }

        debug!(recipient = email.to.as_str(), "message accepted by relay");
        Ok(())
    }
}

/// Mock implementation for testing and scaffolding
#[derive(Default)]
pub struct MockMailTransport;

#[async_trait]
impl MailTransport for MockMailTransport {
    async fn send(&self, _email: &OutboundEmail) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Smart constructor for mock implementation
pub fn mock_transport() -> Arc<dyn MailTransport> {
    Arc::new(MockMailTransport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_core::record::Attachment;
    use mt_core::recipient::Recipient;

    fn email(attachment: Option<Attachment>) -> OutboundEmail {
        OutboundEmail {
            to: Recipient::parse("a@example.com").unwrap(),
            subject: "Launch".into(),
            html_body: "<p>hi</p>".into(),
            attachment,
        }
    }

    #[tokio::test]
    async fn test_mock_transport() -> Result<()> {
        let transport = mock_transport();
        transport.send(&email(None)).await?;
        Ok(())
    }

    #[test]
    fn relay_message_omits_absent_attachment() {
        let email = email(None);
        let message = RelayMessage {
            to: email.to.as_str(),
            subject: &email.subject,
            html: &email.html_body,
            attachment: None,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert!(value.get("attachment").is_none());
        assert_eq!(value["to"], "a@example.com");
    }

    #[test]
    fn relay_message_base64_encodes_attachment() {
        let attachment = RelayAttachment {
            filename: "report.pdf",
            content_base64: base64::engine::general_purpose::STANDARD.encode(b"abc"),
        };
        let value = serde_json::to_value(&attachment).unwrap();
        assert_eq!(value["content_base64"], "YWJj");
        assert_eq!(value["filename"], "report.pdf");
    }
}
