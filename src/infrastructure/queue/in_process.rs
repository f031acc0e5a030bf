use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{
    application::{handlers::dispatch_worker::DispatchHandler, services::queue::DispatchQueue},
    domain::events::DispatchJob,
};

/// Broker-less queue backend: a time-ordered heap drained by a small worker
/// pool. Jobs sit in the heap until due, so this is also the scheduling
/// authority for future-dated work when no JetStream is configured.
pub struct InProcessQueue {
    state: Mutex<State>,
    notify: Notify,
}

struct State {
    heap: BinaryHeap<ScheduledJob>,
    dedup: HashSet<String>,
    seq: u64,
}

struct ScheduledJob {
    due: Instant,
    seq: u64,
    job: DispatchJob,
    dedup_key: Option<String>,
}

// BinaryHeap is a max-heap; invert on (due, seq) to pop the earliest job,
// FIFO among equals.
impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledJob {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for ScheduledJob {}

impl InProcessQueue {
    pub fn new(concurrency: usize) -> (Arc<Self>, InProcessRunner) {
        let queue = Arc::new(Self {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                dedup: HashSet::new(),
                seq: 0,
            }),
            notify: Notify::new(),
        });
        let runner = InProcessRunner {
            queue: queue.clone(),
            concurrency: concurrency.max(1),
        };
        (queue, runner)
    }
}

#[async_trait]
impl DispatchQueue for InProcessQueue {
    async fn enqueue(
        &self,
        job: DispatchJob,
        delay: Duration,
        dedup_key: Option<String>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if let Some(key) = &dedup_key {
            if !state.dedup.insert(key.clone()) {
                tracing::debug!(key = %key, "job with this dedup key is already queued");
                return Ok(());
            }
        }
        state.seq += 1;
        let seq = state.seq;
        state.heap.push(ScheduledJob {
            due: Instant::now() + delay,
            seq,
            job,
            dedup_key,
        });
        drop(state);
        self.notify.notify_one();
        Ok(())
    }
}

pub struct InProcessRunner {
    queue: Arc<InProcessQueue>,
    concurrency: usize,
}

impl InProcessRunner {
    pub fn spawn(self, handler: Arc<DispatchHandler>) -> Vec<JoinHandle<()>> {
        (0..self.concurrency)
            .map(|_| {
                let queue = self.queue.clone();
                let handler = handler.clone();
                tokio::spawn(run_worker(queue, handler))
            })
            .collect()
    }
}

enum Next {
    Ready(Box<ScheduledJob>),
    Sleep(Instant),
    Idle,
}

async fn run_worker(queue: Arc<InProcessQueue>, handler: Arc<DispatchHandler>) {
    loop {
        // Arm the wakeup before inspecting state so an enqueue racing with
        // the check cannot be missed.
        let notified = queue.notify.notified();

        let next = {
            let mut state = queue.state.lock().await;
            let head_due = state.heap.peek().map(|entry| entry.due);
            match head_due {
                Some(due) if due <= Instant::now() => match state.heap.pop() {
                    Some(entry) => Next::Ready(Box::new(entry)),
                    None => Next::Idle,
                },
                Some(due) => Next::Sleep(due),
                None => Next::Idle,
            }
        };

        match next {
            Next::Ready(entry) => {
                handler.process(&entry.job).await;
                if let Some(key) = &entry.dedup_key {
                    queue.state.lock().await.dedup.remove(key);
                }
            }
            Next::Sleep(due) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(due) => {}
                    _ = notified => {}
                }
            }
            Next::Idle => notified.await,
        }
    }
}
