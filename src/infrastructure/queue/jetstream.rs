use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_nats::jetstream::{
    self, AckKind,
    consumer::{AckPolicy, PullConsumer, pull},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use crate::{
    application::{handlers::dispatch_worker::DispatchHandler, services::queue::DispatchQueue},
    domain::events::DispatchJob,
};

/// Header carrying the job's activation instant. A consumer that receives
/// the job early NAKs it back with the remaining delay.
const NOT_BEFORE_HEADER: &str = "Dispatch-Not-Before";

#[derive(Clone)]
pub struct JetstreamQueueConfig {
    pub url: String,
    pub stream: String,
    pub subject: String,
    pub durable: String,
    pub pull_batch: usize,
    pub ack_wait_seconds: u64,
    pub max_deliver: i64,
}

/// Durable queue backend over a JetStream work stream: explicit acks,
/// at-least-once delivery, `Nats-Msg-Id` dedup for re-enqueued scheduled
/// jobs.
pub struct JetstreamQueue {
    context: jetstream::Context,
    subject: String,
}

impl JetstreamQueue {
    pub async fn new(
        config: &JetstreamQueueConfig,
    ) -> anyhow::Result<(Arc<Self>, JetstreamRunner)> {
        let client = async_nats::connect(&config.url).await?;
        let context = jetstream::new(client);

        let stream = context
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: vec![config.subject.clone()],
                ..Default::default()
            })
            .await?;

        let consumer = stream
            .get_or_create_consumer(
                &config.durable,
                pull::Config {
                    durable_name: Some(config.durable.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: Duration::from_secs(config.ack_wait_seconds),
                    max_deliver: config.max_deliver,
                    ..Default::default()
                },
            )
            .await?;

        let queue = Arc::new(Self {
            context,
            subject: config.subject.clone(),
        });

        let runner = JetstreamRunner {
            consumer,
            pull_batch: config.pull_batch,
        };

        Ok((queue, runner))
    }
}

#[async_trait]
impl DispatchQueue for JetstreamQueue {
    async fn enqueue(
        &self,
        job: DispatchJob,
        delay: Duration,
        dedup_key: Option<String>,
    ) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&job)?;
        let not_before = Utc::now() + chrono::Duration::from_std(delay)?;

        let mut headers = async_nats::HeaderMap::new();
        headers.insert(NOT_BEFORE_HEADER, not_before.to_rfc3339().as_str());
        if let Some(key) = &dedup_key {
            headers.insert("Nats-Msg-Id", key.as_str());
        }

        self.context
            .publish_with_headers(self.subject.clone(), headers, payload.into())
            .await?;
        Ok(())
    }
}

pub struct JetstreamRunner {
    consumer: PullConsumer,
    pull_batch: usize,
}

impl JetstreamRunner {
    pub fn spawn(self, handler: Arc<DispatchHandler>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(err) = self.run(handler).await {
                tracing::error!(error = ?err, "jetstream runner stopped");
            }
        })
    }

    async fn run(self, handler: Arc<DispatchHandler>) -> anyhow::Result<()> {
        loop {
            let mut batch = self
                .consumer
                .batch()
                .max_messages(self.pull_batch)
                .messages()
                .await?;
            while let Some(message) = batch.next().await {
                match message {
                    Ok(msg) => {
                        if let Err(err) = Self::process_message(msg, handler.clone()).await {
                            tracing::error!(error = ?err, "failed to process dispatch job");
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = ?err, "jetstream batch error");
                    }
                }
            }
        }
    }

    async fn process_message(
        message: jetstream::Message,
        handler: Arc<DispatchHandler>,
    ) -> anyhow::Result<()> {
        if let Some(remaining) = not_before_remaining(&message) {
            message
                .ack_with(AckKind::Nak(Some(remaining)))
                .await
                .map_err(|e| anyhow!("failed to nak early job: {e}"))?;
            return Ok(());
        }

        let job: DispatchJob = serde_json::from_slice(&message.payload)?;
        // Jobs are never retried from here: the handler already bulk-failed
        // the records on error, so the message is acked either way.
        handler.process(&job).await;
        message
            .ack()
            .await
            .map_err(|e| anyhow!("failed to ack job: {e}"))?;
        Ok(())
    }
}

fn not_before_remaining(message: &jetstream::Message) -> Option<Duration> {
    let headers = message.headers.as_ref()?;
    let raw = headers.get(NOT_BEFORE_HEADER)?;
    let not_before = DateTime::parse_from_rfc3339(raw.as_str()).ok()?;
    let remaining = not_before.with_timezone(&Utc) - Utc::now();
    remaining.to_std().ok().filter(|d| !d.is_zero())
}
