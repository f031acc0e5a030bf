use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    models::{DeliveryStatus, MessageRecord, NewMessageRecord, SendStatus, StatusCounts},
    repositories::MessageRecordRepository,
};

/// Map-backed record store, used by the tests and for database-less runs.
#[derive(Default)]
pub struct InMemoryMessageRecordRepository {
    records: Arc<RwLock<HashMap<Uuid, MessageRecord>>>,
}

impl InMemoryMessageRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRecordRepository for InMemoryMessageRecordRepository {
    async fn insert(&self, record: NewMessageRecord) -> anyhow::Result<MessageRecord> {
        let now = Utc::now();
        let send_status = if record.scheduled_time.is_some() {
            SendStatus::Scheduled
        } else {
            SendStatus::Pending
        };
        let entry = MessageRecord {
            id: Uuid::new_v4(),
            owner_id: record.owner_id,
            recipient_email: record.recipient_email,
            subject: record.subject,
            html_body: record.html_body,
            text_body: record.text_body,
            provider: record.provider,
            provider_message_id: None,
            send_status,
            delivery_status: DeliveryStatus::Pending,
            scheduled_time: record.scheduled_time,
            sent_time: None,
            delivered_time: None,
            open_time: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        let mut records = self.records.write().await;
        records.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<MessageRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&id).cloned())
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        sent_time: DateTime<Utc>,
        provider_message_id: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        if let Some(entry) = records.get_mut(&id) {
            entry.send_status = SendStatus::Sent;
            entry.sent_time = Some(sent_time);
            entry.delivery_status = DeliveryStatus::Delivered;
            if let Some(provider_message_id) = provider_message_id {
                entry.provider_message_id = Some(provider_message_id.to_string());
            }
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_send_failed(&self, id: Uuid, error: &str) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        if let Some(entry) = records.get_mut(&id) {
            entry.send_status = SendStatus::Failed;
            entry.delivery_status = DeliveryStatus::Failed;
            entry.last_error = Some(error.to_string());
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_failed_many(&self, ids: &[Uuid], error: &str) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        for id in ids {
            if let Some(entry) = records.get_mut(id) {
                if entry.send_status == SendStatus::Sent {
                    continue;
                }
                entry.send_status = SendStatus::Failed;
                entry.delivery_status = DeliveryStatus::Failed;
                entry.last_error = Some(error.to_string());
                entry.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn find_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> anyhow::Result<Option<MessageRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.provider_message_id.as_deref() == Some(provider_message_id))
            .cloned())
    }

    async fn find_sent_to_recipient_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| {
                r.recipient_email == email
                    && r.send_status == SendStatus::Sent
                    && r.sent_time.is_some_and(|sent| sent >= since)
            })
            .cloned()
            .collect())
    }

    async fn record_delivered(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        if let Some(entry) = records.get_mut(&id) {
            entry.delivery_status = DeliveryStatus::Delivered;
            entry.delivered_time = Some(at);
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_opened(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        if let Some(entry) = records.get_mut(&id) {
            entry.delivery_status = DeliveryStatus::Opened;
            // First open wins; later opens only reassert the status.
            if entry.open_time.is_none() {
                entry.open_time = Some(at);
            }
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_bounced(&self, id: Uuid, reason: &str) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        if let Some(entry) = records.get_mut(&id) {
            entry.delivery_status = DeliveryStatus::Bounced;
            entry.last_error = Some(reason.to_string());
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: u32,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        let records = self.records.read().await;
        let mut owned: Vec<MessageRecord> = records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned.truncate(limit as usize);
        Ok(owned)
    }

    async fn status_counts(&self, owner_id: Uuid) -> anyhow::Result<StatusCounts> {
        let records = self.records.read().await;
        let mut counts = StatusCounts::default();
        for record in records.values().filter(|r| r.owner_id == owner_id) {
            match record.send_status {
                SendStatus::Pending => counts.pending += 1,
                SendStatus::Scheduled => counts.scheduled += 1,
                SendStatus::Sent => counts.sent += 1,
                SendStatus::Failed => counts.send_failed += 1,
            }
            match record.delivery_status {
                DeliveryStatus::Pending => counts.delivery_pending += 1,
                DeliveryStatus::Delivered => counts.delivered += 1,
                DeliveryStatus::Opened => counts.opened += 1,
                DeliveryStatus::Bounced => counts.bounced += 1,
                DeliveryStatus::Failed => counts.delivery_failed += 1,
            }
        }
        Ok(counts)
    }
}
