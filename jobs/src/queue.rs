use healthsync_core::ids::{DocumentId, UserId};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum Job {
    ProcessDocument {
        user_id: UserId,
        document_id: DocumentId,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("job queue is closed")]
pub struct QueueClosed;

#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), QueueClosed>;
}

/// Unbounded channel feeding the bounded worker pool (spec.md §5: the pool's
/// `Semaphore` is what bounds concurrency, not the channel itself).
pub struct ChannelJobQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl ChannelJobQueue {
    pub fn new(sender: mpsc::UnboundedSender<Job>) -> Self {
        Self { sender }
    }
}

#[async_trait::async_trait]
impl JobQueue for ChannelJobQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueClosed> {
        self.sender.send(job).map_err(|_| QueueClosed)
    }
}
