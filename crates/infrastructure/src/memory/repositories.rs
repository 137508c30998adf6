//! In-memory repositories with the same guarded semantics as the Postgres
//! implementations. They back the embedded deployment mode and give tests a
//! database-free state machine.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use roomsync_core::{SyncError, SyncResult};
use roomsync_domain::entities::{
    JobError, JobPayload, JobStatus, JobType, NewMessage, Room, RoomDraft, RoomMessage, SyncJob,
    UpsertOutcome,
};
use roomsync_domain::repositories::{JobRepository, MessageRepository, RoomRepository};

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: Mutex<Vec<SyncJob>>,
    next_id: AtomicI64,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn transition_error(job: Option<&SyncJob>, id: i64, attempted: &str) -> SyncError {
        match job {
            Some(job) => SyncError::InvalidJobState {
                id,
                status: job.status.to_string(),
                attempted: attempted.to_string(),
            },
            None => SyncError::JobNotFound { id },
        }
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(
        &self,
        job_type: JobType,
        payload: &JobPayload,
        user_id: Option<i64>,
    ) -> SyncResult<SyncJob> {
        let now = Utc::now();
        let job = SyncJob {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            job_type,
            status: JobStatus::Queued,
            payload: payload.clone(),
            result: None,
            error: None,
            user_id,
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.lock().await.push(job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: i64) -> SyncResult<Option<SyncJob>> {
        Ok(self.jobs.lock().await.iter().find(|j| j.id == id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> SyncResult<Vec<SyncJob>> {
        Ok(self
            .jobs
            .lock()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_processing(&self, id: i64) -> SyncResult<SyncJob> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.iter_mut().find(|j| j.id == id);
        match job {
            Some(job) if job.status == JobStatus::Queued => {
                let now = Utc::now();
                job.status = JobStatus::Processing;
                job.started_at = Some(now);
                job.updated_at = now;
                Ok(job.clone())
            }
            other => Err(Self::transition_error(
                other.as_deref(),
                id,
                "mark processing",
            )),
        }
    }

    async fn mark_completed(&self, id: i64, result: &serde_json::Value) -> SyncResult<SyncJob> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.iter_mut().find(|j| j.id == id);
        match job {
            Some(job) if job.status == JobStatus::Processing => {
                let now = Utc::now();
                job.status = JobStatus::Completed;
                job.result = Some(result.clone());
                job.finished_at = Some(now);
                job.updated_at = now;
                Ok(job.clone())
            }
            other => Err(Self::transition_error(
                other.as_deref(),
                id,
                "mark completed",
            )),
        }
    }

    async fn mark_failed(&self, id: i64, error: &JobError) -> SyncResult<SyncJob> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.iter_mut().find(|j| j.id == id);
        match job {
            Some(job)
                if matches!(job.status, JobStatus::Queued | JobStatus::Processing) =>
            {
                let now = Utc::now();
                job.status = JobStatus::Failed;
                job.error = Some(error.clone());
                job.finished_at = Some(now);
                job.updated_at = now;
                Ok(job.clone())
            }
            other => Err(Self::transition_error(other.as_deref(), id, "mark failed")),
        }
    }

    async fn mark_canceled(&self, id: i64) -> SyncResult<SyncJob> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.iter_mut().find(|j| j.id == id);
        match job {
            Some(job)
                if matches!(job.status, JobStatus::Queued | JobStatus::Processing) =>
            {
                let now = Utc::now();
                job.status = JobStatus::Canceled;
                job.finished_at = Some(now);
                job.updated_at = now;
                Ok(job.clone())
            }
            other => Err(Self::transition_error(other.as_deref(), id, "cancel")),
        }
    }

    async fn update_result(&self, id: i64, result: &serde_json::Value) -> SyncResult<()> {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id) {
            // progress flushes stop once the job left processing
            if job.status == JobStatus::Processing {
                job.result = Some(result.clone());
                job.updated_at = Utc::now();
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRoomRepository {
    rooms: Mutex<Vec<Room>>,
    links: Mutex<Vec<(i64, i64)>>,
    next_id: AtomicI64,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(Vec::new()),
            links: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Link a room to a company, as the surrounding CRM would
    pub async fn link_company(&self, room_id: i64, company_id: i64) {
        let mut links = self.links.lock().await;
        if !links.contains(&(room_id, company_id)) {
            links.push((room_id, company_id));
        }
    }

    pub async fn set_active(&self, external_id: &str, active: bool) {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.iter_mut().find(|r| r.external_id == external_id) {
            room.active = active;
        }
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn upsert(&self, draft: &RoomDraft) -> SyncResult<UpsertOutcome> {
        let mut rooms = self.rooms.lock().await;
        let now = Utc::now();

        if let Some(room) = rooms
            .iter_mut()
            .find(|r| r.external_id == draft.external_id)
        {
            room.name = draft.name.clone();
            room.description = draft.description.clone();
            room.updated_at = now;
            return Ok(UpsertOutcome::Updated);
        }

        rooms.push(Room {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            external_id: draft.external_id.clone(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            active: true,
            last_synced_message_id: None,
            last_sync_at: None,
            last_error_at: None,
            last_error_message: None,
            last_error_status: None,
            created_at: now,
            updated_at: now,
        });
        Ok(UpsertOutcome::Created)
    }

    async fn find_by_external_id(&self, external_id: &str) -> SyncResult<Option<Room>> {
        Ok(self
            .rooms
            .lock()
            .await
            .iter()
            .find(|r| r.external_id == external_id)
            .cloned())
    }

    async fn list_active(&self, limit: Option<usize>) -> SyncResult<Vec<Room>> {
        let rooms = self.rooms.lock().await;
        let mut active: Vec<Room> = rooms.iter().filter(|r| r.active).cloned().collect();
        // oldest-synced-first, never-synced rooms ahead of everything
        active.sort_by(|a, b| match (a.last_sync_at, b.last_sync_at) {
            (None, None) => a.id.cmp(&b.id),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y).then(a.id.cmp(&b.id)),
        });
        if let Some(limit) = limit {
            active.truncate(limit);
        }
        Ok(active)
    }

    async fn list_for_company(&self, company_id: i64) -> SyncResult<Vec<Room>> {
        let links = self.links.lock().await;
        let room_ids: Vec<i64> = links
            .iter()
            .filter(|(_, c)| *c == company_id)
            .map(|(r, _)| *r)
            .collect();
        drop(links);

        let rooms = self.rooms.lock().await;
        Ok(rooms
            .iter()
            .filter(|r| room_ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn linked_company_ids(&self, room_id: i64) -> SyncResult<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .links
            .lock()
            .await
            .iter()
            .filter(|(r, _)| *r == room_id)
            .map(|(_, c)| *c)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn record_sync_success(
        &self,
        room_id: i64,
        watermark: Option<&str>,
        at: DateTime<Utc>,
    ) -> SyncResult<()> {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.iter_mut().find(|r| r.id == room_id) {
            room.last_sync_at = Some(at);
            if let Some(watermark) = watermark {
                room.last_synced_message_id = Some(watermark.to_string());
            }
            room.last_error_at = None;
            room.last_error_message = None;
            room.last_error_status = None;
            room.updated_at = at;
        }
        Ok(())
    }

    async fn record_sync_error(
        &self,
        room_id: i64,
        message: &str,
        status: Option<u16>,
        at: DateTime<Utc>,
    ) -> SyncResult<()> {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.iter_mut().find(|r| r.id == room_id) {
            room.last_error_at = Some(at);
            room.last_error_message = Some(message.to_string());
            room.last_error_status = status.map(i32::from);
            room.updated_at = at;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: Mutex<Vec<RoomMessage>>,
    next_id: AtomicI64,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn messages_for_room(&self, room_id: i64) -> Vec<RoomMessage> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn insert_if_absent(&self, message: &NewMessage) -> SyncResult<bool> {
        let mut messages = self.messages.lock().await;
        let exists = messages
            .iter()
            .any(|m| m.room_id == message.room_id && m.external_id == message.external_id);
        if exists {
            return Ok(false);
        }

        messages.push(RoomMessage {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            room_id: message.room_id,
            external_id: message.external_id.clone(),
            sender_id: message.sender_id.clone(),
            sender_name: message.sender_name.clone(),
            body: message.body.clone(),
            sent_at: message.sent_at,
            company_id: message.company_id,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn count_for_room(&self, room_id: i64) -> SyncResult<i64> {
        Ok(self
            .messages
            .lock()
            .await
            .iter()
            .filter(|m| m.room_id == room_id)
            .count() as i64)
    }
}
