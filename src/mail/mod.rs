//! Outbound email for reset codes.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail delivery failed ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), MailError>;
}

/// Posts messages as JSON to a transactional-mail webhook.
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(client: Client, endpoint: impl Into<String>, config: &MailConfig) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: Message) -> Result<(), MailError> {
        let mut request = self.client.post(&self.endpoint).json(&WebhookPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::info!("Sent '{}' to {}", message.subject, message.to);
            Ok(())
        } else {
            Err(MailError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Messages a [`LogMailer`] keeps for inspection.
pub const LOG_MAILER_HISTORY: usize = 64;

/// Writes messages to the log instead of delivering them. The body is
/// logged at `debug` since it carries reset codes.
#[derive(Default)]
pub struct LogMailer {
    sent: RwLock<VecDeque<Message>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent messages, oldest first.
    pub async fn sent(&self) -> Vec<Message> {
        self.sent.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: Message) -> Result<(), MailError> {
        tracing::info!(to = %message.to, subject = %message.subject, "mail delivery disabled, message logged");
        tracing::debug!(to = %message.to, "{}", message.text);

        let mut sent = self.sent.write().await;
        if sent.len() == LOG_MAILER_HISTORY {
            sent.pop_front();
        }
        sent.push_back(message);
        Ok(())
    }
}
