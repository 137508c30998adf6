use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use roomsync_core::SyncResult;

use crate::entities::JobType;

/// What travels through the queue: just enough to find the job row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobEnvelope {
    pub job_id: i64,
    pub job_type: JobType,
}

/// One envelope handed to a worker, with the backend's delivery handle
#[derive(Debug, Clone)]
pub struct QueuedDelivery {
    pub envelope: JobEnvelope,
    pub delivery_tag: u64,
}

/// Work-queue abstraction with at-least-once dispatch
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn publish(&self, envelope: &JobEnvelope) -> SyncResult<()>;

    /// Fetch one pending envelope, or None when the queue is empty
    async fn poll(&self) -> SyncResult<Option<QueuedDelivery>>;

    async fn ack(&self, delivery: &QueuedDelivery) -> SyncResult<()>;

    async fn nack(&self, delivery: &QueuedDelivery, requeue: bool) -> SyncResult<()>;

    /// Best-effort removal of a still-pending job. Returns whether an
    /// envelope was actually removed; backends that cannot address a single
    /// pending message return false.
    async fn remove_pending(&self, job_id: i64) -> SyncResult<bool>;
}
