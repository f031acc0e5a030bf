use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};

use crate::{
    application::services::gateway::{ProviderClient, SendReceipt},
    domain::models::{MessageRecord, ProviderHealth, ProviderKind},
};

#[derive(Clone, Default)]
pub struct SmtpCredentials {
    pub username: String,
    pub password: String,
}

/// Fire-and-forget SMTP transport. No message id comes back, so delivery
/// callbacks for these can only correlate through the recipient window.
pub struct SmtpClient {
    provider: ProviderKind,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    username: String,
}

impl SmtpClient {
    pub fn gmail(credentials: SmtpCredentials) -> anyhow::Result<Arc<dyn ProviderClient>> {
        Self::new(ProviderKind::Gmail, "smtp.gmail.com", credentials)
    }

    pub fn outlook(credentials: SmtpCredentials) -> anyhow::Result<Arc<dyn ProviderClient>> {
        Self::new(ProviderKind::Outlook, "smtp.office365.com", credentials)
    }

    fn new(
        provider: ProviderKind,
        relay: &str,
        credentials: SmtpCredentials,
    ) -> anyhow::Result<Arc<dyn ProviderClient>> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(relay)?
            .port(587)
            .credentials(Credentials::new(
                credentials.username.clone(),
                credentials.password,
            ))
            .build();
        Ok(Arc::new(Self {
            provider,
            mailer,
            username: credentials.username,
        }) as Arc<dyn ProviderClient>)
    }
}

#[async_trait]
impl ProviderClient for SmtpClient {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn send(&self, record: &MessageRecord) -> anyhow::Result<SendReceipt> {
        if self.username.is_empty() {
            anyhow::bail!("{} smtp account not configured", self.provider.as_str());
        }

        let from: Mailbox = self
            .username
            .parse()
            .map_err(|e| anyhow!("invalid sender address: {e}"))?;
        let to: Mailbox = record
            .recipient_email
            .parse()
            .map_err(|e| anyhow!("invalid recipient address: {e}"))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(record.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                record.text_body.clone(),
                record.html_body.clone(),
            ))?;

        self.mailer.send(message).await?;
        Ok(SendReceipt::default())
    }

    async fn check_status(&self) -> ProviderHealth {
        if self.username.is_empty() {
            return ProviderHealth::Error;
        }
        match self.mailer.test_connection().await {
            Ok(true) => ProviderHealth::Connected,
            Ok(false) => ProviderHealth::Error,
            Err(err) => {
                tracing::warn!(
                    provider = self.provider.as_str(),
                    error = %err,
                    "smtp probe failed"
                );
                ProviderHealth::Error
            }
        }
    }
}
