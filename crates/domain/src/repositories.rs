//! Repository abstractions for the sync engine's persisted state.
//!
//! Implementations live in the infrastructure crate; the application layer
//! depends only on these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use roomsync_core::SyncResult;

use crate::entities::{
    JobError, JobPayload, JobType, NewMessage, Room, RoomDraft, SyncJob, UpsertOutcome,
};

/// Job persistence with guarded status transitions.
///
/// Every `mark_*` method enforces the state machine at the storage layer:
/// the update is conditional on the current status, and a job that is not
/// in an allowed source state yields `InvalidJobState` (or `JobNotFound`
/// when the row does not exist at all).
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Create a job in `queued`
    async fn create(
        &self,
        job_type: JobType,
        payload: &JobPayload,
        user_id: Option<i64>,
    ) -> SyncResult<SyncJob>;

    async fn find_by_id(&self, id: i64) -> SyncResult<Option<SyncJob>>;

    /// Most recent jobs first
    async fn list_recent(&self, limit: usize) -> SyncResult<Vec<SyncJob>>;

    /// queued -> processing; sets started_at
    async fn mark_processing(&self, id: i64) -> SyncResult<SyncJob>;

    /// processing -> completed; sets finished_at and the result
    async fn mark_completed(&self, id: i64, result: &serde_json::Value) -> SyncResult<SyncJob>;

    /// queued|processing -> failed; sets finished_at and the error.
    /// The queued source covers enqueue-handoff failures, where no worker
    /// will ever pick the job up.
    async fn mark_failed(&self, id: i64, error: &JobError) -> SyncResult<SyncJob>;

    /// queued|processing -> canceled; sets finished_at immediately
    async fn mark_canceled(&self, id: i64) -> SyncResult<SyncJob>;

    /// Re-flush the result field while the job is processing, for
    /// incremental progress. A no-op once the job left processing.
    async fn update_result(&self, id: i64, result: &serde_json::Value) -> SyncResult<()>;
}

/// Room persistence
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Idempotent upsert keyed by external id, reporting which branch ran
    async fn upsert(&self, draft: &RoomDraft) -> SyncResult<UpsertOutcome>;

    async fn find_by_external_id(&self, external_id: &str) -> SyncResult<Option<Room>>;

    /// Active rooms, oldest-synced-first; `limit` caps the result
    async fn list_active(&self, limit: Option<usize>) -> SyncResult<Vec<Room>>;

    /// Rooms linked to a company through the link table
    async fn list_for_company(&self, company_id: i64) -> SyncResult<Vec<Room>>;

    /// Companies linked to a room; drives message auto-assignment
    async fn linked_company_ids(&self, room_id: i64) -> SyncResult<Vec<i64>>;

    /// Successful fetch: set last_sync_at, advance the watermark when given,
    /// and clear the stored error fields
    async fn record_sync_success(
        &self,
        room_id: i64,
        watermark: Option<&str>,
        at: DateTime<Utc>,
    ) -> SyncResult<()>;

    /// Failed fetch: store the (pre-truncated) message, optional HTTP
    /// status and timestamp; the watermark is left alone
    async fn record_sync_error(
        &self,
        room_id: i64,
        message: &str,
        status: Option<u16>,
        at: DateTime<Utc>,
    ) -> SyncResult<()>;
}

/// Message persistence
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert unless (room_id, external_id) already exists; returns whether
    /// a row was written
    async fn insert_if_absent(&self, message: &NewMessage) -> SyncResult<bool>;

    async fn count_for_room(&self, room_id: i64) -> SyncResult<i64>;
}
