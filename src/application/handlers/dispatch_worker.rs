use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;

use crate::{
    application::services::{
        clock::Clock, gateway::ProviderGateway, queue::DispatchQueue, throttle::inter_send_delay,
    },
    domain::{
        events::DispatchJob,
        models::{MessageRecord, SendStatus},
        repositories::MessageRecordRepository,
    },
};

pub struct DispatchWorkerConfig {
    /// Upper bound on one gateway call. A provider call that never returns
    /// would otherwise stall the whole job.
    pub send_timeout: Duration,
}

impl Default for DispatchWorkerConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(30),
        }
    }
}

/// Drains one dispatch job at a time: strictly ordered sends, fixed-cadence
/// pacing between them, record-level failure isolation. Queue runners call
/// [`DispatchHandler::process`] once per delivered job.
pub struct DispatchHandler {
    records: Arc<dyn MessageRecordRepository>,
    gateway: ProviderGateway,
    queue: Arc<dyn DispatchQueue>,
    clock: Arc<dyn Clock>,
    config: DispatchWorkerConfig,
}

impl DispatchHandler {
    pub fn new(
        records: Arc<dyn MessageRecordRepository>,
        gateway: ProviderGateway,
        queue: Arc<dyn DispatchQueue>,
        clock: Arc<dyn Clock>,
        config: DispatchWorkerConfig,
    ) -> Self {
        Self {
            records,
            gateway,
            queue,
            clock,
            config,
        }
    }

    /// Full lifecycle for one delivered job. Infrastructure failures mark
    /// every unsent record in the job as failed; the completion pass then
    /// hands any still-scheduled records back to the queue. Jobs are never
    /// retried from here — retry policy lives above the worker.
    pub async fn process(&self, job: &DispatchJob) {
        tracing::info!(job_id = %job.job_id, records = job.message_ids.len(), "dispatch job started");
        if let Err(err) = self.drain(job).await {
            self.fail_job(job, &err).await;
        }
        if let Err(err) = self.requeue_scheduled(job).await {
            tracing::error!(job_id = %job.job_id, error = %err, "failed to requeue scheduled records");
        }
        tracing::info!(job_id = %job.job_id, "dispatch job finished");
    }

    /// Walks the job's records in order. Only repository errors propagate;
    /// a failed send marks its record and the loop moves on.
    async fn drain(&self, job: &DispatchJob) -> anyhow::Result<()> {
        let delay = inter_send_delay(job.throttle_per_hour);
        let mut next_due: Option<tokio::time::Instant> = None;

        for &message_id in &job.message_ids {
            let Some(record) = self.records.get(message_id).await? else {
                tracing::warn!(%message_id, "record missing, skipping");
                continue;
            };

            if let Some(scheduled) = record.scheduled_time {
                if scheduled > self.clock.now() {
                    tracing::info!(%message_id, %scheduled, "not due yet, leaving for its own job");
                    continue;
                }
            }

            if let Some(due) = next_due {
                tokio::time::sleep_until(due).await;
            }
            self.send_one(&record).await?;
            // Pace from the absolute due time, not from a relative sleep, so
            // the cadence stays exact regardless of how long the send took.
            next_due = Some(tokio::time::Instant::now() + delay);
        }

        Ok(())
    }

    async fn send_one(&self, record: &MessageRecord) -> anyhow::Result<()> {
        let outcome = match self.gateway.get(record.provider) {
            Some(client) => {
                match tokio::time::timeout(self.config.send_timeout, client.send(record)).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!(
                        "send timed out after {:?}",
                        self.config.send_timeout
                    )),
                }
            }
            None => Err(anyhow!(
                "no client registered for provider {}",
                record.provider.as_str()
            )),
        };

        match outcome {
            Ok(receipt) => {
                self.records
                    .mark_sent(
                        record.id,
                        self.clock.now(),
                        receipt.provider_message_id.as_deref(),
                    )
                    .await?;
                tracing::info!(
                    record_id = %record.id,
                    recipient = %record.recipient_email,
                    provider = record.provider.as_str(),
                    "message sent"
                );
            }
            Err(err) => {
                tracing::warn!(
                    record_id = %record.id,
                    recipient = %record.recipient_email,
                    error = %err,
                    "send failed"
                );
                self.records
                    .mark_send_failed(record.id, &err.to_string())
                    .await?;
            }
        }

        Ok(())
    }

    /// Completion pass: records this job left in `scheduled` get their own
    /// single-record job, delayed until their due time and deduplicated so
    /// overlapping completions cannot double-book a record.
    async fn requeue_scheduled(&self, job: &DispatchJob) -> anyhow::Result<()> {
        for &message_id in &job.message_ids {
            let Some(record) = self.records.get(message_id).await? else {
                continue;
            };
            if record.send_status != SendStatus::Scheduled {
                continue;
            }
            let Some(scheduled) = record.scheduled_time else {
                continue;
            };

            let delay = (scheduled - self.clock.now()).to_std().unwrap_or_default();
            let single = DispatchJob {
                job_id: uuid::Uuid::new_v4(),
                message_ids: vec![message_id],
                throttle_per_hour: 1,
                owner_id: job.owner_id,
                schedule_time: Some(scheduled),
            };
            self.queue
                .enqueue(single, delay, Some(format!("scheduled-{message_id}")))
                .await?;
            tracing::info!(%message_id, %scheduled, "requeued scheduled record");
        }
        Ok(())
    }

    async fn fail_job(&self, job: &DispatchJob, err: &anyhow::Error) {
        tracing::error!(job_id = %job.job_id, error = %err, "dispatch job failed");
        if let Err(mark_err) = self
            .records
            .mark_failed_many(&job.message_ids, &err.to_string())
            .await
        {
            tracing::error!(job_id = %job.job_id, error = %mark_err, "failed to bulk-mark records");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use super::*;
    use crate::{
        application::services::{
            clock::VirtualClock,
            gateway::{ProviderClient, SendReceipt},
        },
        domain::models::{DeliveryStatus, NewMessageRecord, ProviderHealth, ProviderKind},
        infrastructure::repositories::in_memory::InMemoryMessageRecordRepository,
    };

    struct StubProvider {
        kind: ProviderKind,
        fail_for: Vec<String>,
        message_id: Option<String>,
        sends: Arc<Mutex<Vec<(String, tokio::time::Instant)>>>,
    }

    impl StubProvider {
        fn new(kind: ProviderKind) -> (Arc<Self>, Arc<Mutex<Vec<(String, tokio::time::Instant)>>>) {
            let sends = Arc::new(Mutex::new(Vec::new()));
            let provider = Arc::new(Self {
                kind,
                fail_for: Vec::new(),
                message_id: None,
                sends: sends.clone(),
            });
            (provider, sends)
        }
    }

    #[async_trait]
    impl ProviderClient for StubProvider {
        fn provider(&self) -> ProviderKind {
            self.kind
        }

        async fn send(&self, record: &MessageRecord) -> anyhow::Result<SendReceipt> {
            self.sends
                .lock()
                .await
                .push((record.recipient_email.clone(), tokio::time::Instant::now()));
            if self.fail_for.contains(&record.recipient_email) {
                anyhow::bail!("mailbox unavailable");
            }
            Ok(SendReceipt {
                provider_message_id: self.message_id.clone(),
            })
        }

        async fn check_status(&self) -> ProviderHealth {
            ProviderHealth::Connected
        }
    }

    struct HangingProvider(ProviderKind);

    #[async_trait]
    impl ProviderClient for HangingProvider {
        fn provider(&self) -> ProviderKind {
            self.0
        }

        async fn send(&self, _record: &MessageRecord) -> anyhow::Result<SendReceipt> {
            std::future::pending::<anyhow::Result<SendReceipt>>().await
        }

        async fn check_status(&self) -> ProviderHealth {
            ProviderHealth::Error
        }
    }

    #[derive(Default)]
    struct RecordingQueue {
        jobs: Mutex<Vec<(DispatchJob, Duration, Option<String>)>>,
    }

    #[async_trait]
    impl DispatchQueue for RecordingQueue {
        async fn enqueue(
            &self,
            job: DispatchJob,
            delay: Duration,
            dedup_key: Option<String>,
        ) -> anyhow::Result<()> {
            self.jobs.lock().await.push((job, delay, dedup_key));
            Ok(())
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    async fn seed(
        repo: &InMemoryMessageRecordRepository,
        owner: Uuid,
        email: &str,
        scheduled: Option<DateTime<Utc>>,
    ) -> MessageRecord {
        repo.insert(NewMessageRecord {
            owner_id: owner,
            recipient_email: email.to_string(),
            subject: "hello".to_string(),
            html_body: "<p>hi</p>".to_string(),
            text_body: "hi".to_string(),
            provider: ProviderKind::Sendgrid,
            scheduled_time: scheduled,
        })
        .await
        .unwrap()
    }

    fn handler(
        repo: Arc<InMemoryMessageRecordRepository>,
        client: Arc<dyn ProviderClient>,
        queue: Arc<RecordingQueue>,
    ) -> DispatchHandler {
        DispatchHandler::new(
            repo,
            ProviderGateway::new(vec![client]),
            queue,
            Arc::new(VirtualClock::new(base_time())),
            DispatchWorkerConfig {
                send_timeout: Duration::from_secs(5),
            },
        )
    }

    fn job(ids: Vec<Uuid>, throttle: u32, owner: Uuid) -> DispatchJob {
        DispatchJob {
            job_id: Uuid::new_v4(),
            message_ids: ids,
            throttle_per_hour: throttle,
            owner_id: owner,
            schedule_time: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn paces_sends_at_the_requested_rate() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let owner = Uuid::new_v4();
        let (provider, sends) = StubProvider::new(ProviderKind::Sendgrid);
        let queue = Arc::new(RecordingQueue::default());
        let handler = handler(repo.clone(), provider, queue);

        let mut ids = Vec::new();
        for email in ["a@x.io", "b@x.io", "c@x.io"] {
            ids.push(seed(&repo, owner, email, None).await.id);
        }

        // 3600/hour -> one second between sends.
        handler.process(&job(ids, 3_600, owner)).await;

        let sends = sends.lock().await;
        assert_eq!(sends.len(), 3);
        assert_eq!(sends[1].1 - sends[0].1, Duration::from_secs(1));
        assert_eq!(sends[2].1 - sends[1].1, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_does_not_abort_the_job() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let owner = Uuid::new_v4();
        let sends = Arc::new(Mutex::new(Vec::new()));
        let provider = Arc::new(StubProvider {
            kind: ProviderKind::Sendgrid,
            fail_for: vec!["b@x.io".to_string()],
            message_id: None,
            sends: sends.clone(),
        });
        let queue = Arc::new(RecordingQueue::default());
        let handler = handler(repo.clone(), provider, queue);

        let a = seed(&repo, owner, "a@x.io", None).await;
        let b = seed(&repo, owner, "b@x.io", None).await;
        let c = seed(&repo, owner, "c@x.io", None).await;

        handler
            .process(&job(vec![a.id, b.id, c.id], 3_600, owner))
            .await;

        for id in [a.id, c.id] {
            let record = repo.get(id).await.unwrap().unwrap();
            assert_eq!(record.send_status, SendStatus::Sent);
            assert_eq!(record.delivery_status, DeliveryStatus::Delivered);
            assert!(record.sent_time.is_some());
        }
        let failed = repo.get(b.id).await.unwrap().unwrap();
        assert_eq!(failed.send_status, SendStatus::Failed);
        assert_eq!(failed.delivery_status, DeliveryStatus::Failed);
        assert!(failed.last_error.unwrap().contains("mailbox unavailable"));
        assert_eq!(sends.lock().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_record_is_skipped_and_requeued() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let owner = Uuid::new_v4();
        let (provider, sends) = StubProvider::new(ProviderKind::Sendgrid);
        let queue = Arc::new(RecordingQueue::default());
        let handler = handler(repo.clone(), provider, queue.clone());

        let due_now = seed(&repo, owner, "now@x.io", None).await;
        let scheduled_at = base_time() + chrono::Duration::hours(1);
        let later = seed(&repo, owner, "later@x.io", Some(scheduled_at)).await;

        handler
            .process(&job(vec![due_now.id, later.id], 3_600, owner))
            .await;

        assert_eq!(sends.lock().await.len(), 1);
        let untouched = repo.get(later.id).await.unwrap().unwrap();
        assert_eq!(untouched.send_status, SendStatus::Scheduled);

        let jobs = queue.jobs.lock().await;
        assert_eq!(jobs.len(), 1);
        let (requeued, delay, dedup_key) = &jobs[0];
        assert_eq!(requeued.message_ids, vec![later.id]);
        assert_eq!(requeued.throttle_per_hour, 1);
        assert_eq!(dedup_key.as_deref(), Some(format!("scheduled-{}", later.id).as_str()));
        // Activation delay is the remaining time until the scheduled instant.
        assert!(*delay <= Duration::from_secs(3_600));
        assert!(*delay >= Duration::from_secs(3_590));
    }

    #[tokio::test(start_paused = true)]
    async fn past_due_scheduled_record_is_sent() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let owner = Uuid::new_v4();
        let (provider, sends) = StubProvider::new(ProviderKind::Sendgrid);
        let queue = Arc::new(RecordingQueue::default());
        let handler = handler(repo.clone(), provider, queue.clone());

        let record = seed(
            &repo,
            owner,
            "due@x.io",
            Some(base_time() - chrono::Duration::minutes(5)),
        )
        .await;

        handler.process(&job(vec![record.id], 3_600, owner)).await;

        assert_eq!(sends.lock().await.len(), 1);
        let sent = repo.get(record.id).await.unwrap().unwrap();
        assert_eq!(sent.send_status, SendStatus::Sent);
        assert!(queue.jobs.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_record_is_skipped() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let owner = Uuid::new_v4();
        let (provider, sends) = StubProvider::new(ProviderKind::Sendgrid);
        let queue = Arc::new(RecordingQueue::default());
        let handler = handler(repo.clone(), provider, queue);

        let real = seed(&repo, owner, "real@x.io", None).await;

        handler
            .process(&job(vec![Uuid::new_v4(), real.id], 3_600, owner))
            .await;

        assert_eq!(sends.lock().await.len(), 1);
        let record = repo.get(real.id).await.unwrap().unwrap();
        assert_eq!(record.send_status, SendStatus::Sent);
    }

    #[tokio::test(start_paused = true)]
    async fn stores_the_provider_message_id() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let owner = Uuid::new_v4();
        let provider = Arc::new(StubProvider {
            kind: ProviderKind::Sendgrid,
            fail_for: Vec::new(),
            message_id: Some("sg-msg-42".to_string()),
            sends: Arc::new(Mutex::new(Vec::new())),
        });
        let queue = Arc::new(RecordingQueue::default());
        let handler = handler(repo.clone(), provider, queue);

        let record = seed(&repo, owner, "a@x.io", None).await;
        handler.process(&job(vec![record.id], 3_600, owner)).await;

        let sent = repo.get(record.id).await.unwrap().unwrap();
        assert_eq!(sent.provider_message_id.as_deref(), Some("sg-msg-42"));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_call_times_out_and_fails_the_record() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let owner = Uuid::new_v4();
        let queue = Arc::new(RecordingQueue::default());
        let handler = handler(
            repo.clone(),
            Arc::new(HangingProvider(ProviderKind::Sendgrid)),
            queue,
        );

        let record = seed(&repo, owner, "a@x.io", None).await;
        handler.process(&job(vec![record.id], 3_600, owner)).await;

        let failed = repo.get(record.id).await.unwrap().unwrap();
        assert_eq!(failed.send_status, SendStatus::Failed);
        assert!(failed.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_provider_fails_the_record_not_the_job() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let owner = Uuid::new_v4();
        let (provider, _) = StubProvider::new(ProviderKind::Gmail);
        let queue = Arc::new(RecordingQueue::default());
        // Gateway only knows gmail; the record wants sendgrid.
        let handler = handler(repo.clone(), provider, queue);

        let record = seed(&repo, owner, "a@x.io", None).await;
        handler.process(&job(vec![record.id], 3_600, owner)).await;

        let failed = repo.get(record.id).await.unwrap().unwrap();
        assert_eq!(failed.send_status, SendStatus::Failed);
        assert!(failed.last_error.unwrap().contains("no client registered"));
    }

    #[tokio::test]
    async fn job_fatal_failure_bulk_marks_unsent_records() {
        let repo = Arc::new(InMemoryMessageRecordRepository::new());
        let owner = Uuid::new_v4();
        let (provider, _) = StubProvider::new(ProviderKind::Sendgrid);
        let queue = Arc::new(RecordingQueue::default());
        let handler = handler(repo.clone(), provider, queue);

        let sent = seed(&repo, owner, "done@x.io", None).await;
        repo.mark_sent(sent.id, Utc::now(), None).await.unwrap();
        let pending = seed(&repo, owner, "pending@x.io", None).await;

        let job = job(vec![sent.id, pending.id], 3_600, owner);
        handler.fail_job(&job, &anyhow!("queue connection lost")).await;

        let kept = repo.get(sent.id).await.unwrap().unwrap();
        assert_eq!(kept.send_status, SendStatus::Sent);
        let failed = repo.get(pending.id).await.unwrap().unwrap();
        assert_eq!(failed.send_status, SendStatus::Failed);
        assert_eq!(failed.delivery_status, DeliveryStatus::Failed);
        assert!(failed.last_error.unwrap().contains("queue connection lost"));
    }
}
