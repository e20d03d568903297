use std::sync::Arc;
use std::time::Duration;

use healthsync_core::ids::{DocumentId, UserId};
use storage::document_registry::DocumentRegistry;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::processor::DocumentProcessor;
use crate::queue::Job;

/// Bounded pool of size `W` gating concurrent processing tasks process-wide
/// (spec.md §5). Generalizes the single always-on worker into `W` permits on
/// a `Semaphore`; the channel itself stays unbounded, so double-enqueue is
/// only ever resolved by the registry's CAS (§4.8 step 1), never by the
/// channel.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    processor: Arc<DocumentProcessor>,
    registry: Arc<dyn DocumentRegistry>,
    task_deadline: Duration,
}

impl WorkerPool {
    pub fn new(
        pool_size: usize,
        processor: Arc<DocumentProcessor>,
        registry: Arc<dyn DocumentRegistry>,
        task_deadline: Duration,
    ) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(pool_size.max(1))),
            processor,
            registry,
            task_deadline,
        }
    }

    /// Drives the queue until the sender side is dropped, then waits for
    /// every in-flight task to finish before returning. Each job acquires a
    /// permit before its task is spawned, so at most `pool_size` documents
    /// are processed concurrently regardless of how many jobs are queued.
    pub async fn run(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<Job>) {
        info!("worker pool started");
        let mut in_flight = JoinSet::new();

        while let Some(job) = receiver.recv().await {
            let Job::ProcessDocument {
                user_id,
                document_id,
            } = job;

            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore is never closed while the pool is running");
            let pool = self.clone();

            in_flight.spawn(async move {
                let _permit = permit;
                pool.run_one(user_id, document_id).await;
            });
        }

        while in_flight.join_next().await.is_some() {}
        info!("worker pool stopped");
    }

    async fn run_one(&self, user_id: UserId, document_id: DocumentId) {
        let outcome =
            tokio::time::timeout(self.task_deadline, self.processor.process(&user_id, &document_id))
                .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(%document_id, %e, "processing attempt failed");
            }
            Err(_elapsed) => {
                warn!(%document_id, "processing task cancelled on deadline");
                let _ = self
                    .registry
                    .mark_failed(&user_id, &document_id, "cancelled".to_string())
                    .await;
            }
        }
    }
}
