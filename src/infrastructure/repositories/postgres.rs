use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, Row};
use uuid::Uuid;

use crate::domain::{
    models::{DeliveryStatus, MessageRecord, NewMessageRecord, ProviderKind, SendStatus, StatusCounts},
    repositories::MessageRecordRepository,
};

pub type PgPool = Pool<Postgres>;

const RECORD_COLUMNS: &str = r#"
    id,
    owner_id,
    recipient_email,
    subject,
    html_body,
    text_body,
    provider,
    provider_message_id,
    send_status,
    delivery_status,
    scheduled_time,
    sent_time,
    delivered_time,
    open_time,
    last_error,
    created_at,
    updated_at
"#;

#[derive(Clone)]
pub struct PostgresMessageRecordRepository {
    pool: PgPool,
}

impl PostgresMessageRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRecordRepository for PostgresMessageRecordRepository {
    async fn insert(&self, record: NewMessageRecord) -> anyhow::Result<MessageRecord> {
        let now = Utc::now();
        let send_status = if record.scheduled_time.is_some() {
            SendStatus::Scheduled
        } else {
            SendStatus::Pending
        };
        let row = sqlx::query_as::<_, MessageRecordRow>(&format!(
            r#"
            INSERT INTO message_records (
                id,
                owner_id,
                recipient_email,
                subject,
                html_body,
                text_body,
                provider,
                send_status,
                delivery_status,
                scheduled_time,
                created_at,
                updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(record.owner_id)
        .bind(&record.recipient_email)
        .bind(&record.subject)
        .bind(&record.html_body)
        .bind(&record.text_body)
        .bind(record.provider.as_str())
        .bind(send_status.as_str())
        .bind(DeliveryStatus::Pending.as_str())
        .bind(record.scheduled_time)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        MessageRecord::try_from(row)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<MessageRecord>> {
        let row = sqlx::query_as::<_, MessageRecordRow>(&format!(
            r#"SELECT {RECORD_COLUMNS} FROM message_records WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MessageRecord::try_from).transpose()
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        sent_time: DateTime<Utc>,
        provider_message_id: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE message_records
            SET send_status = 'sent',
                sent_time = $2,
                delivery_status = 'delivered',
                provider_message_id = COALESCE($3, provider_message_id),
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(sent_time)
        .bind(provider_message_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_send_failed(&self, id: Uuid, error: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE message_records
            SET send_status = 'failed',
                delivery_status = 'failed',
                last_error = $2,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed_many(&self, ids: &[Uuid], error: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE message_records
            SET send_status = 'failed',
                delivery_status = 'failed',
                last_error = $2,
                updated_at = $3
            WHERE id = ANY($1) AND send_status <> 'sent'
            "#,
        )
        .bind(ids)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> anyhow::Result<Option<MessageRecord>> {
        let row = sqlx::query_as::<_, MessageRecordRow>(&format!(
            r#"SELECT {RECORD_COLUMNS} FROM message_records WHERE provider_message_id = $1"#
        ))
        .bind(provider_message_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MessageRecord::try_from).transpose()
    }

    async fn find_sent_to_recipient_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        let rows = sqlx::query_as::<_, MessageRecordRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS} FROM message_records
            WHERE recipient_email = $1
              AND send_status = 'sent'
              AND sent_time >= $2
            "#
        ))
        .bind(email)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(MessageRecord::try_from).collect()
    }

    async fn record_delivered(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE message_records
            SET delivery_status = 'delivered', delivered_time = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_opened(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        // COALESCE keeps the first observed open time.
        sqlx::query(
            r#"
            UPDATE message_records
            SET delivery_status = 'opened', open_time = COALESCE(open_time, $2), updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_bounced(&self, id: Uuid, reason: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE message_records
            SET delivery_status = 'bounced', last_error = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: u32,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        let rows = sqlx::query_as::<_, MessageRecordRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS} FROM message_records
            WHERE owner_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(owner_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(MessageRecord::try_from).collect()
    }

    async fn status_counts(&self, owner_id: Uuid) -> anyhow::Result<StatusCounts> {
        let mut counts = StatusCounts::default();

        let send_rows = sqlx::query(
            r#"
            SELECT send_status, COUNT(*) AS total
            FROM message_records WHERE owner_id = $1
            GROUP BY send_status
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        for row in send_rows {
            let status: String = row.try_get("send_status")?;
            let total: i64 = row.try_get("total")?;
            match SendStatus::from_str(&status) {
                Some(SendStatus::Pending) => counts.pending = total as u64,
                Some(SendStatus::Scheduled) => counts.scheduled = total as u64,
                Some(SendStatus::Sent) => counts.sent = total as u64,
                Some(SendStatus::Failed) => counts.send_failed = total as u64,
                None => {}
            }
        }

        let delivery_rows = sqlx::query(
            r#"
            SELECT delivery_status, COUNT(*) AS total
            FROM message_records WHERE owner_id = $1
            GROUP BY delivery_status
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        for row in delivery_rows {
            let status: String = row.try_get("delivery_status")?;
            let total: i64 = row.try_get("total")?;
            match DeliveryStatus::from_str(&status) {
                Some(DeliveryStatus::Pending) => counts.delivery_pending = total as u64,
                Some(DeliveryStatus::Delivered) => counts.delivered = total as u64,
                Some(DeliveryStatus::Opened) => counts.opened = total as u64,
                Some(DeliveryStatus::Bounced) => counts.bounced = total as u64,
                Some(DeliveryStatus::Failed) => counts.delivery_failed = total as u64,
                None => {}
            }
        }

        Ok(counts)
    }
}

#[derive(FromRow)]
struct MessageRecordRow {
    id: Uuid,
    owner_id: Uuid,
    recipient_email: String,
    subject: String,
    html_body: String,
    text_body: String,
    provider: String,
    provider_message_id: Option<String>,
    send_status: String,
    delivery_status: String,
    scheduled_time: Option<DateTime<Utc>>,
    sent_time: Option<DateTime<Utc>>,
    delivered_time: Option<DateTime<Utc>>,
    open_time: Option<DateTime<Utc>>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MessageRecordRow> for MessageRecord {
    type Error = anyhow::Error;

    fn try_from(row: MessageRecordRow) -> Result<Self, Self::Error> {
        Ok(MessageRecord {
            id: row.id,
            owner_id: row.owner_id,
            recipient_email: row.recipient_email,
            subject: row.subject,
            html_body: row.html_body,
            text_body: row.text_body,
            provider: ProviderKind::from_str(&row.provider)
                .ok_or_else(|| anyhow!("unknown provider in store: {}", row.provider))?,
            provider_message_id: row.provider_message_id,
            send_status: SendStatus::from_str(&row.send_status)
                .ok_or_else(|| anyhow!("unknown send status in store: {}", row.send_status))?,
            delivery_status: DeliveryStatus::from_str(&row.delivery_status).ok_or_else(|| {
                anyhow!("unknown delivery status in store: {}", row.delivery_status)
            })?,
            scheduled_time: row.scheduled_time,
            sent_time: row.sent_time,
            delivered_time: row.delivered_time,
            open_time: row.open_time,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
