use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    application::services::{
        clock::Clock,
        queue::DispatchQueue,
        renderer::TemplateRenderer,
    },
    domain::{
        errors::DomainError,
        events::DispatchJob,
        models::{NewMessageRecord, ProviderKind},
        repositories::MessageRecordRepository,
    },
};

pub struct SubmitCampaignUseCase {
    records: Arc<dyn MessageRecordRepository>,
    queue: Arc<dyn DispatchQueue>,
    renderer: Arc<dyn TemplateRenderer>,
    clock: Arc<dyn Clock>,
}

pub struct RecipientInput {
    pub email: String,
    pub fields: serde_json::Value,
}

pub struct SubmitCampaignRequest {
    pub owner_id: Uuid,
    pub subject: String,
    pub template: String,
    pub provider: ProviderKind,
    pub recipients: Vec<RecipientInput>,
    pub throttle_per_hour: u32,
    pub schedule_time: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct SubmitCampaignResponse {
    pub queued_count: u32,
    pub first_rendered_preview: Option<String>,
}

impl SubmitCampaignUseCase {
    pub fn new(
        records: Arc<dyn MessageRecordRepository>,
        queue: Arc<dyn DispatchQueue>,
        renderer: Arc<dyn TemplateRenderer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            queue,
            renderer,
            clock,
        }
    }

    /// Creates one record per recipient that renders cleanly, then submits
    /// exactly one dispatch job over the surviving ids. Individual render
    /// failures skip that recipient; a batch where nothing survives is
    /// rejected and nothing is enqueued.
    pub async fn execute(
        &self,
        request: SubmitCampaignRequest,
    ) -> anyhow::Result<SubmitCampaignResponse> {
        if request.recipients.is_empty() {
            return Err(DomainError::Validation("no recipient data provided".into()).into());
        }
        if request.throttle_per_hour == 0 {
            return Err(DomainError::Validation("throttle must be positive".into()).into());
        }

        let now = self.clock.now();
        // A schedule in the past means "send now"; only future instants make
        // records start out scheduled.
        let schedule_time = request.schedule_time.filter(|at| *at > now);

        let mut message_ids = Vec::with_capacity(request.recipients.len());
        let mut first_rendered_preview = None;

        for recipient in &request.recipients {
            let rendered =
                match self
                    .renderer
                    .render(&request.subject, &request.template, &recipient.fields)
                {
                    Ok(rendered) => rendered,
                    Err(err) => {
                        tracing::warn!(
                            recipient = %recipient.email,
                            error = %err,
                            "render failed, skipping recipient"
                        );
                        continue;
                    }
                };

            let record = self
                .records
                .insert(NewMessageRecord {
                    owner_id: request.owner_id,
                    recipient_email: recipient.email.clone(),
                    subject: rendered.subject,
                    html_body: rendered.html_body,
                    text_body: rendered.text_body,
                    provider: request.provider,
                    scheduled_time: schedule_time,
                })
                .await?;

            if first_rendered_preview.is_none() {
                first_rendered_preview = Some(record.html_body.clone());
            }
            message_ids.push(record.id);
        }

        if message_ids.is_empty() {
            return Err(DomainError::Validation("no valid recipients".into()).into());
        }

        let queued_count = message_ids.len() as u32;
        let delay = schedule_time
            .map(|at| (at - now).to_std().unwrap_or_default())
            .unwrap_or(Duration::ZERO);

        let job = DispatchJob {
            job_id: Uuid::new_v4(),
            message_ids,
            throttle_per_hour: request.throttle_per_hour,
            owner_id: request.owner_id,
            schedule_time,
        };
        self.queue.enqueue(job, delay, None).await?;

        tracing::info!(
            owner_id = %request.owner_id,
            queued = queued_count,
            total = request.recipients.len(),
            "campaign submitted"
        );

        Ok(SubmitCampaignResponse {
            queued_count,
            first_rendered_preview,
        })
    }
}
