use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Sendgrid,
    Gmail,
    Outlook,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Sendgrid => "sendgrid",
            ProviderKind::Gmail => "gmail",
            ProviderKind::Outlook => "outlook",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "sendgrid" => Some(ProviderKind::Sendgrid),
            "gmail" => Some(ProviderKind::Gmail),
            "outlook" => Some(ProviderKind::Outlook),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderHealth {
    Connected,
    Error,
}
