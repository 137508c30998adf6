use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use roomsync_core::SyncResult;
use roomsync_domain::ports::{JobEnvelope, JobQueue, QueuedDelivery};

/// In-process queue for embedded deployments and tests.
///
/// Unlike the RabbitMQ backend this one can actually remove a pending
/// envelope by job id.
#[derive(Default)]
pub struct InMemoryJobQueue {
    pending: Mutex<VecDeque<JobEnvelope>>,
    next_tag: AtomicU64,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn publish(&self, envelope: &JobEnvelope) -> SyncResult<()> {
        self.pending.lock().await.push_back(envelope.clone());
        debug!(job_id = envelope.job_id, "job queued in memory");
        Ok(())
    }

    async fn poll(&self) -> SyncResult<Option<QueuedDelivery>> {
        let envelope = self.pending.lock().await.pop_front();
        Ok(envelope.map(|envelope| QueuedDelivery {
            envelope,
            delivery_tag: self.next_tag.fetch_add(1, Ordering::Relaxed),
        }))
    }

    async fn ack(&self, _delivery: &QueuedDelivery) -> SyncResult<()> {
        Ok(())
    }

    async fn nack(&self, delivery: &QueuedDelivery, requeue: bool) -> SyncResult<()> {
        if requeue {
            self.pending
                .lock()
                .await
                .push_back(delivery.envelope.clone());
        }
        Ok(())
    }

    async fn remove_pending(&self, job_id: i64) -> SyncResult<bool> {
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|envelope| envelope.job_id != job_id);
        Ok(pending.len() < before)
    }
}
