use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::provider::ProviderKind;

/// Lifecycle of the send attempt itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Pending,
    Scheduled,
    Sent,
    Failed,
}

impl SendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendStatus::Pending => "pending",
            SendStatus::Scheduled => "scheduled",
            SendStatus::Sent => "sent",
            SendStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SendStatus::Pending),
            "scheduled" => Some(SendStatus::Scheduled),
            "sent" => Some(SendStatus::Sent),
            "failed" => Some(SendStatus::Failed),
            _ => None,
        }
    }
}

/// Provider-observed delivery outcome. Independent axis from [`SendStatus`]:
/// the worker writes the send side, the reconciler writes this side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Opened,
    Bounced,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Opened => "opened",
            DeliveryStatus::Bounced => "bounced",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(DeliveryStatus::Pending),
            "delivered" => Some(DeliveryStatus::Delivered),
            "opened" => Some(DeliveryStatus::Opened),
            "bounced" => Some(DeliveryStatus::Bounced),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

/// One persisted recipient-level send attempt and its evolving delivery
/// outcome. Created by the campaign submitter, mutated by the dispatch worker
/// (send side) and the delivery reconciler (delivery side), never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub recipient_email: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub provider: ProviderKind,
    pub provider_message_id: Option<String>,
    pub send_status: SendStatus,
    pub delivery_status: DeliveryStatus,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub sent_time: Option<DateTime<Utc>>,
    pub delivered_time: Option<DateTime<Utc>>,
    pub open_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a record. A present `scheduled_time` makes the record
/// start out `scheduled`, otherwise `pending`.
#[derive(Debug, Clone)]
pub struct NewMessageRecord {
    pub owner_id: Uuid,
    pub recipient_email: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub provider: ProviderKind,
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Per-owner tallies over both status axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub scheduled: u64,
    pub sent: u64,
    pub send_failed: u64,
    pub delivery_pending: u64,
    pub delivered: u64,
    pub opened: u64,
    pub bounced: u64,
    pub delivery_failed: u64,
}
