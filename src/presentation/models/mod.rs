use poem_openapi::Enum;

use crate::domain::models::{DeliveryStatus, ProviderHealth, ProviderKind, SendStatus};

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProviderKindDto {
    #[oai(rename = "sendgrid")]
    Sendgrid,
    #[oai(rename = "gmail")]
    Gmail,
    #[oai(rename = "outlook")]
    Outlook,
}

impl From<ProviderKindDto> for ProviderKind {
    fn from(value: ProviderKindDto) -> Self {
        match value {
            ProviderKindDto::Sendgrid => ProviderKind::Sendgrid,
            ProviderKindDto::Gmail => ProviderKind::Gmail,
            ProviderKindDto::Outlook => ProviderKind::Outlook,
        }
    }
}

impl From<ProviderKind> for ProviderKindDto {
    fn from(value: ProviderKind) -> Self {
        match value {
            ProviderKind::Sendgrid => ProviderKindDto::Sendgrid,
            ProviderKind::Gmail => ProviderKindDto::Gmail,
            ProviderKind::Outlook => ProviderKindDto::Outlook,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum SendStatusDto {
    #[oai(rename = "pending")]
    Pending,
    #[oai(rename = "scheduled")]
    Scheduled,
    #[oai(rename = "sent")]
    Sent,
    #[oai(rename = "failed")]
    Failed,
}

impl From<SendStatus> for SendStatusDto {
    fn from(value: SendStatus) -> Self {
        match value {
            SendStatus::Pending => SendStatusDto::Pending,
            SendStatus::Scheduled => SendStatusDto::Scheduled,
            SendStatus::Sent => SendStatusDto::Sent,
            SendStatus::Failed => SendStatusDto::Failed,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeliveryStatusDto {
    #[oai(rename = "pending")]
    Pending,
    #[oai(rename = "delivered")]
    Delivered,
    #[oai(rename = "opened")]
    Opened,
    #[oai(rename = "bounced")]
    Bounced,
    #[oai(rename = "failed")]
    Failed,
}

impl From<DeliveryStatus> for DeliveryStatusDto {
    fn from(value: DeliveryStatus) -> Self {
        match value {
            DeliveryStatus::Pending => DeliveryStatusDto::Pending,
            DeliveryStatus::Delivered => DeliveryStatusDto::Delivered,
            DeliveryStatus::Opened => DeliveryStatusDto::Opened,
            DeliveryStatus::Bounced => DeliveryStatusDto::Bounced,
            DeliveryStatus::Failed => DeliveryStatusDto::Failed,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProviderHealthDto {
    #[oai(rename = "connected")]
    Connected,
    #[oai(rename = "error")]
    Error,
}

impl From<ProviderHealth> for ProviderHealthDto {
    fn from(value: ProviderHealth) -> Self {
        match value {
            ProviderHealth::Connected => ProviderHealthDto::Connected,
            ProviderHealth::Error => ProviderHealthDto::Error,
        }
    }
}
