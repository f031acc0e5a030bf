use chrono::{DateTime, Utc};

/// Time source for everything that compares against `scheduled_time` or
/// stamps records. Injected so tests can run on virtual time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to the tokio timer: wall time = `base` + virtual elapsed.
/// Under a paused runtime this keeps chrono timestamps in lockstep with
/// `tokio::time`, which is what the pacing and delay-queue tests rely on.
pub struct VirtualClock {
    base: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl VirtualClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.start.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.base + elapsed
    }
}
