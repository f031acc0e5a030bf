use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::application::handlers::dispatch_worker::DispatchHandler;

pub mod in_process;
pub mod jetstream;

/// Consumer side of whichever queue backend the service was wired with.
pub enum QueueRunner {
    InProcess(in_process::InProcessRunner),
    Jetstream(jetstream::JetstreamRunner),
}

impl QueueRunner {
    pub fn spawn(self, handler: Arc<DispatchHandler>) -> Vec<JoinHandle<()>> {
        match self {
            QueueRunner::InProcess(runner) => runner.spawn(handler),
            QueueRunner::Jetstream(runner) => vec![runner.spawn(handler)],
        }
    }
}
