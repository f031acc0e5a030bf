use std::time::Duration;

use async_trait::async_trait;

use crate::domain::events::DispatchJob;

/// Delay-capable job queue with at-least-once delivery. The queue is the
/// single scheduling authority for future-dated work: a job handed in with a
/// delay is held until due, and a `dedup_key` makes re-enqueues of the same
/// logical job collapse into one.
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    async fn enqueue(
        &self,
        job: DispatchJob,
        delay: Duration,
        dedup_key: Option<String>,
    ) -> anyhow::Result<()>;
}
