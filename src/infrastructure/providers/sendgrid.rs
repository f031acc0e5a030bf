use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::{
    application::services::gateway::{ProviderClient, SendReceipt},
    domain::models::{MessageRecord, ProviderHealth, ProviderKind},
};

#[derive(Clone)]
pub struct SendgridConfig {
    pub api_key: String,
    pub from_email: String,
    pub base_url: String,
}

impl Default for SendgridConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from_email: String::new(),
            base_url: "https://api.sendgrid.com".to_string(),
        }
    }
}

/// Tracked API provider. The record id rides along as a custom arg so the
/// webhook can correlate exactly, and the response's `x-message-id` header
/// becomes the record's provider message id.
pub struct SendgridClient {
    http: Client,
    config: SendgridConfig,
}

impl SendgridClient {
    pub fn new(config: SendgridConfig) -> anyhow::Result<Arc<dyn ProviderClient>> {
        let http = Client::builder()
            .user_agent("campaigns/sendgrid")
            .build()?;
        Ok(Arc::new(Self { http, config }) as Arc<dyn ProviderClient>)
    }

    async fn post_mail(&self, body: &MailSendRequest<'_>) -> anyhow::Result<reqwest::Response> {
        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl ProviderClient for SendgridClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Sendgrid
    }

    async fn send(&self, record: &MessageRecord) -> anyhow::Result<SendReceipt> {
        if self.config.api_key.is_empty() {
            anyhow::bail!("sendgrid api key not configured");
        }
        if self.config.from_email.is_empty() {
            anyhow::bail!("sendgrid sender address not configured");
        }

        let body = MailSendRequest {
            personalizations: vec![Personalization {
                to: vec![EmailAddress {
                    email: &record.recipient_email,
                }],
                custom_args: Some(CustomArgs {
                    email_id: record.id.to_string(),
                }),
            }],
            from: EmailAddress {
                email: &self.config.from_email,
            },
            subject: &record.subject,
            content: vec![
                Content {
                    content_type: "text/plain",
                    value: &record.text_body,
                },
                Content {
                    content_type: "text/html",
                    value: &record.html_body,
                },
            ],
            tracking_settings: Some(TrackingSettings {
                click_tracking: Toggle { enable: true },
                open_tracking: Toggle { enable: true },
                subscription_tracking: Toggle { enable: false },
            }),
            mail_settings: None,
        };

        let response = self.post_mail(&body).await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("sendgrid rejected the message: {status} {detail}");
        }

        let provider_message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(SendReceipt {
            provider_message_id,
        })
    }

    /// Sandbox-mode submission: validated by the API but never delivered.
    async fn check_status(&self) -> ProviderHealth {
        if self.config.api_key.is_empty() || self.config.from_email.is_empty() {
            return ProviderHealth::Error;
        }

        let probe = MailSendRequest {
            personalizations: vec![Personalization {
                to: vec![EmailAddress {
                    email: "probe@example.com",
                }],
                custom_args: None,
            }],
            from: EmailAddress {
                email: &self.config.from_email,
            },
            subject: "Connection probe",
            content: vec![Content {
                content_type: "text/plain",
                value: "probe",
            }],
            tracking_settings: None,
            mail_settings: Some(MailSettings {
                sandbox_mode: Toggle { enable: true },
            }),
        };

        match self.post_mail(&probe).await {
            Ok(response) if response.status().is_success() => ProviderHealth::Connected,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "sendgrid probe rejected");
                ProviderHealth::Error
            }
            Err(err) => {
                tracing::warn!(error = %err, "sendgrid probe failed");
                ProviderHealth::Error
            }
        }
    }
}

#[derive(Serialize)]
struct MailSendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: EmailAddress<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracking_settings: Option<TrackingSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mail_settings: Option<MailSettings>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<EmailAddress<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_args: Option<CustomArgs>,
}

#[derive(Serialize)]
struct CustomArgs {
    #[serde(rename = "emailId")]
    email_id: String,
}

#[derive(Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct TrackingSettings {
    click_tracking: Toggle,
    open_tracking: Toggle,
    subscription_tracking: Toggle,
}

#[derive(Serialize)]
struct MailSettings {
    sandbox_mode: Toggle,
}

#[derive(Serialize)]
struct Toggle {
    enable: bool,
}
