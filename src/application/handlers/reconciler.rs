use std::sync::Arc;

use crate::{
    application::services::clock::Clock,
    domain::{
        events::{DeliveryEvent, DeliveryEventKind},
        models::MessageRecord,
        repositories::MessageRecordRepository,
    },
};

/// How far back the degraded recipient-email correlation looks.
const CORRELATION_WINDOW_HOURS: i64 = 24;

/// Applies asynchronous provider callbacks onto message records. Runs on its
/// own ingestion path and assumes nothing about ordering relative to sends.
pub struct DeliveryReconciler {
    records: Arc<dyn MessageRecordRepository>,
    clock: Arc<dyn Clock>,
}

impl DeliveryReconciler {
    pub fn new(records: Arc<dyn MessageRecordRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { records, clock }
    }

    /// Processes a callback batch. Events are independent: a failing update
    /// is logged and never aborts its siblings. Returns how many events were
    /// processed without error (no-ops included).
    pub async fn apply_batch(&self, events: &[DeliveryEvent]) -> u32 {
        let mut processed = 0;
        for event in events {
            match self.apply(event).await {
                Ok(()) => processed += 1,
                Err(err) => tracing::error!(
                    event = %event.event_type,
                    recipient = %event.recipient_email,
                    error = %err,
                    "failed to apply delivery event"
                ),
            }
        }
        processed
    }

    pub async fn apply(&self, event: &DeliveryEvent) -> anyhow::Result<()> {
        let Some(kind) = event.kind() else {
            tracing::info!(event = %event.event_type, "ignoring unhandled delivery event type");
            return Ok(());
        };

        let matches = self.correlate(event).await?;
        if matches.is_empty() {
            tracing::warn!(
                event = %event.event_type,
                recipient = %event.recipient_email,
                "no record correlated for delivery event"
            );
            return Ok(());
        }

        for record in matches {
            match kind {
                DeliveryEventKind::Delivered => {
                    self.records
                        .record_delivered(record.id, event.timestamp)
                        .await?;
                }
                DeliveryEventKind::Opened => {
                    self.records
                        .record_opened(record.id, event.timestamp)
                        .await?;
                }
                DeliveryEventKind::Bounced => {
                    let reason = event.reason.as_deref().unwrap_or("bounced");
                    self.records.record_bounced(record.id, reason).await?;
                }
            }
            tracing::info!(
                record_id = %record.id,
                event = %event.event_type,
                "delivery event applied"
            );
        }

        Ok(())
    }

    /// Correlation order: our own record id echoed back as a custom arg,
    /// then the provider-assigned message id, then the degraded mode —
    /// recipient email over sent records inside the trailing window, where
    /// every match is updated. The degraded path exists for untracked
    /// providers and is deliberately weak; tracked providers always carry a
    /// token.
    async fn correlate(&self, event: &DeliveryEvent) -> anyhow::Result<Vec<MessageRecord>> {
        if let Some(record_id) = event.record_id {
            if let Some(record) = self.records.get(record_id).await? {
                return Ok(vec![record]);
            }
        }

        if let Some(provider_message_id) = &event.provider_message_id {
            if let Some(record) = self
                .records
                .find_by_provider_message_id(provider_message_id)
                .await?
            {
                return Ok(vec![record]);
            }
        }

        let since = self.clock.now() - chrono::Duration::hours(CORRELATION_WINDOW_HOURS);
        let matches = self
            .records
            .find_sent_to_recipient_since(&event.recipient_email, since)
            .await?;
        if !matches.is_empty() {
            tracing::debug!(
                recipient = %event.recipient_email,
                matched = matches.len(),
                "correlated by recipient window (degraded mode)"
            );
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::{
        application::services::clock::Clock,
        domain::models::{DeliveryStatus, NewMessageRecord, ProviderKind},
        infrastructure::repositories::in_memory::InMemoryMessageRecordRepository,
    };

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn event(event_type: &str, email: &str) -> DeliveryEvent {
        DeliveryEvent {
            event_type: event_type.to_string(),
            recipient_email: email.to_string(),
            timestamp: now(),
            record_id: None,
            provider_message_id: None,
            reason: None,
        }
    }

    async fn seed_sent(
        repo: &InMemoryMessageRecordRepository,
        email: &str,
        sent_at: DateTime<Utc>,
        provider_message_id: Option<&str>,
    ) -> Uuid {
        let record = repo
            .insert(NewMessageRecord {
                owner_id: Uuid::new_v4(),
                recipient_email: email.to_string(),
                subject: "s".to_string(),
                html_body: "<p>b</p>".to_string(),
                text_body: "b".to_string(),
                provider: ProviderKind::Sendgrid,
                scheduled_time: None,
            })
            .await
            .unwrap();
        repo.mark_sent(record.id, sent_at, provider_message_id)
            .await
            .unwrap();
        record.id
    }

    fn reconciler(repo: Arc<InMemoryMessageRecordRepository>) -> DeliveryReconciler {
        DeliveryReconciler::new(repo, Arc::new(FixedClock(now())))
    }

    #[tokio::test]
    async fn bounce_by_provider_message_id_overrides_prior_status() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let id = seed_sent(&repo, "a@x.io", now(), Some("sg-1")).await;
        repo.record_opened(id, now()).await.unwrap();
        let reconciler = reconciler(repo.clone());

        let mut bounce = event("bounce", "a@x.io");
        bounce.provider_message_id = Some("sg-1".to_string());
        bounce.reason = Some("550 user unknown".to_string());
        reconciler.apply(&bounce).await.unwrap();

        let record = repo.get(id).await.unwrap().unwrap();
        assert_eq!(record.delivery_status, DeliveryStatus::Bounced);
        assert_eq!(record.last_error.as_deref(), Some("550 user unknown"));
    }

    #[tokio::test]
    async fn repeated_opens_are_idempotent_and_keep_the_first_open_time() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let id = seed_sent(&repo, "a@x.io", now(), Some("sg-1")).await;
        let reconciler = reconciler(repo.clone());

        let mut first = event("open", "a@x.io");
        first.provider_message_id = Some("sg-1".to_string());
        first.timestamp = now();
        reconciler.apply(&first).await.unwrap();

        let mut second = first.clone();
        second.timestamp = now() + Duration::minutes(30);
        reconciler.apply(&second).await.unwrap();

        let record = repo.get(id).await.unwrap().unwrap();
        assert_eq!(record.delivery_status, DeliveryStatus::Opened);
        assert_eq!(record.open_time, Some(now()));
    }

    #[tokio::test]
    async fn delivered_event_stamps_the_delivery_time() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let id = seed_sent(&repo, "a@x.io", now(), Some("sg-1")).await;
        let reconciler = reconciler(repo.clone());

        let mut delivered = event("delivered", "a@x.io");
        delivered.provider_message_id = Some("sg-1".to_string());
        delivered.timestamp = now() + Duration::minutes(2);
        reconciler.apply(&delivered).await.unwrap();

        let record = repo.get(id).await.unwrap().unwrap();
        assert_eq!(record.delivery_status, DeliveryStatus::Delivered);
        assert_eq!(record.delivered_time, Some(now() + Duration::minutes(2)));
    }

    #[tokio::test]
    async fn record_id_custom_arg_beats_everything_else() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let target = seed_sent(&repo, "a@x.io", now(), None).await;
        let bystander = seed_sent(&repo, "a@x.io", now(), None).await;
        let reconciler = reconciler(repo.clone());

        let mut open = event("open", "a@x.io");
        open.record_id = Some(target);
        reconciler.apply(&open).await.unwrap();

        assert_eq!(
            repo.get(target).await.unwrap().unwrap().delivery_status,
            DeliveryStatus::Opened
        );
        assert_eq!(
            repo.get(bystander).await.unwrap().unwrap().delivery_status,
            DeliveryStatus::Delivered
        );
    }

    #[tokio::test]
    async fn degraded_correlation_updates_every_sent_record_in_the_window() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let recent_a = seed_sent(&repo, "a@x.io", now() - Duration::hours(1), None).await;
        let recent_b = seed_sent(&repo, "a@x.io", now() - Duration::hours(2), None).await;
        let stale = seed_sent(&repo, "a@x.io", now() - Duration::hours(30), None).await;
        let other = seed_sent(&repo, "b@x.io", now() - Duration::hours(1), None).await;
        let reconciler = reconciler(repo.clone());

        reconciler.apply(&event("open", "a@x.io")).await.unwrap();

        for id in [recent_a, recent_b] {
            assert_eq!(
                repo.get(id).await.unwrap().unwrap().delivery_status,
                DeliveryStatus::Opened
            );
        }
        for id in [stale, other] {
            assert_eq!(
                repo.get(id).await.unwrap().unwrap().delivery_status,
                DeliveryStatus::Delivered
            );
        }
    }

    #[tokio::test]
    async fn unknown_event_types_and_correlation_misses_are_no_ops() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let id = seed_sent(&repo, "a@x.io", now(), Some("sg-1")).await;
        let reconciler = reconciler(repo.clone());

        reconciler.apply(&event("click", "a@x.io")).await.unwrap();
        reconciler
            .apply(&event("open", "stranger@x.io"))
            .await
            .unwrap();

        let record = repo.get(id).await.unwrap().unwrap();
        assert_eq!(record.delivery_status, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn batch_processing_is_per_event_independent() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let id = seed_sent(&repo, "a@x.io", now(), Some("sg-1")).await;
        let reconciler = reconciler(repo.clone());

        let mut open = event("open", "a@x.io");
        open.provider_message_id = Some("sg-1".to_string());
        let batch = vec![event("open", "nobody@x.io"), event("unsubscribe", "a@x.io"), open];
        let processed = reconciler.apply_batch(&batch).await;

        assert_eq!(processed, 3);
        assert_eq!(
            repo.get(id).await.unwrap().unwrap().delivery_status,
            DeliveryStatus::Opened
        );
    }
}
