use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{models::StatusCounts, repositories::MessageRecordRepository};

pub struct CampaignStatsUseCase {
    records: Arc<dyn MessageRecordRepository>,
}

pub struct CampaignStats {
    pub counts: StatusCounts,
    /// `opened / totalSent * 100`, two decimals, zero when nothing was sent.
    pub response_rate: f64,
}

impl CampaignStatsUseCase {
    pub fn new(records: Arc<dyn MessageRecordRepository>) -> Self {
        Self { records }
    }

    pub async fn execute(&self, owner_id: Uuid) -> anyhow::Result<CampaignStats> {
        let counts = self.records.status_counts(owner_id).await?;
        Ok(CampaignStats {
            counts,
            response_rate: response_rate(counts.opened, counts.sent),
        })
    }
}

fn response_rate(opened: u64, total_sent: u64) -> f64 {
    if total_sent == 0 {
        return 0.0;
    }
    let rate = opened as f64 / total_sent as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}
