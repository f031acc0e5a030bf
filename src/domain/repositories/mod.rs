use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::models::{MessageRecord, NewMessageRecord, StatusCounts};

#[async_trait]
pub trait MessageRecordRepository: Send + Sync {
    async fn insert(&self, record: NewMessageRecord) -> anyhow::Result<MessageRecord>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<MessageRecord>>;

    /// Send side: success. Sets `sent` plus the optimistic `delivered`
    /// delivery status; stores the provider message id when one came back.
    async fn mark_sent(
        &self,
        id: Uuid,
        sent_time: DateTime<Utc>,
        provider_message_id: Option<&str>,
    ) -> anyhow::Result<()>;

    /// Send side: failure. Sets both axes to `failed` and records the error.
    async fn mark_send_failed(&self, id: Uuid, error: &str) -> anyhow::Result<()>;

    /// Job-fatal path: bulk-fails every listed record that has not already
    /// been sent.
    async fn mark_failed_many(&self, ids: &[Uuid], error: &str) -> anyhow::Result<()>;

    async fn find_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> anyhow::Result<Option<MessageRecord>>;

    /// Degraded correlation: sent records for a recipient with `sent_time`
    /// inside the trailing window.
    async fn find_sent_to_recipient_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MessageRecord>>;

    async fn record_delivered(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;

    /// `open_time` is first-writer-wins; the status flip is idempotent.
    async fn record_opened(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;

    async fn record_bounced(&self, id: Uuid, reason: &str) -> anyhow::Result<()>;

    /// Newest-first listing for the status endpoint.
    async fn list_by_owner(&self, owner_id: Uuid, limit: u32)
    -> anyhow::Result<Vec<MessageRecord>>;

    async fn status_counts(&self, owner_id: Uuid) -> anyhow::Result<StatusCounts>;
}
