use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue payload: one batch of record ids to drain in order, with the pacing
/// and schedule parameters the worker applies while draining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchJob {
    pub job_id: Uuid,
    /// Send order. The worker walks these strictly sequentially.
    pub message_ids: Vec<Uuid>,
    pub throttle_per_hour: u32,
    /// Submitting user, carried for audit only.
    pub owner_id: Uuid,
    pub schedule_time: Option<DateTime<Utc>>,
}

/// Normalized provider callback, as ingested by the reconciler. Shapes on the
/// wire are provider-defined; the webhook mapper flattens them into this.
#[derive(Debug, Clone)]
pub struct DeliveryEvent {
    /// Raw provider event name, kept for logging unhandled kinds.
    pub event_type: String,
    pub recipient_email: String,
    pub timestamp: DateTime<Utc>,
    /// Our own record id when the provider echoed it back as a custom arg.
    pub record_id: Option<Uuid>,
    /// Provider-assigned message id, when the provider is a tracked one.
    pub provider_message_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEventKind {
    Delivered,
    Opened,
    Bounced,
}

impl DeliveryEvent {
    /// Event kinds the reconciler acts on. Anything else is logged and
    /// dropped without a state change.
    pub fn kind(&self) -> Option<DeliveryEventKind> {
        match self.event_type.as_str() {
            "delivered" => Some(DeliveryEventKind::Delivered),
            "open" | "opened" => Some(DeliveryEventKind::Opened),
            "bounce" | "bounced" => Some(DeliveryEventKind::Bounced),
            _ => None,
        }
    }
}
