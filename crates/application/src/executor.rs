use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use roomsync_core::{SyncError, SyncResult};
use roomsync_domain::entities::{JobError, JobPayload, JobStatus, SyncJob};
use roomsync_domain::ports::CancelProbe;
use roomsync_domain::repositories::JobRepository;

use crate::messages_sync::MessagesSync;
use crate::rooms_sync::RoomsSync;

/// Cancellation probe backed by the job row itself. A cancel request lands
/// in the database; running jobs observe it at their next checkpoint.
pub struct JobCancelProbe {
    jobs: Arc<dyn JobRepository>,
    job_id: i64,
}

impl JobCancelProbe {
    pub fn new(jobs: Arc<dyn JobRepository>, job_id: i64) -> Self {
        Self { jobs, job_id }
    }
}

#[async_trait]
impl CancelProbe for JobCancelProbe {
    async fn checkpoint(&self) -> SyncResult<()> {
        let job = self
            .jobs
            .find_by_id(self.job_id)
            .await?
            .ok_or(SyncError::JobNotFound { id: self.job_id })?;
        if job.status == JobStatus::Canceled {
            return Err(SyncError::Canceled);
        }
        Ok(())
    }
}

/// Runs one job end to end: claims the row, dispatches to the matching
/// sync algorithm and records the terminal state.
///
/// The return value is the worker's ack signal: `Ok` covers completion,
/// cancellation and redelivered terminal jobs; `Err` means the failure was
/// recorded and the envelope should be dropped (nack without requeue).
pub struct JobExecutor {
    jobs: Arc<dyn JobRepository>,
    rooms_sync: Arc<RoomsSync>,
    messages_sync: Arc<MessagesSync>,
}

impl JobExecutor {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        rooms_sync: Arc<RoomsSync>,
        messages_sync: Arc<MessagesSync>,
    ) -> Self {
        Self {
            jobs,
            rooms_sync,
            messages_sync,
        }
    }

    pub async fn execute(&self, job_id: i64) -> SyncResult<()> {
        let probe = JobCancelProbe::new(self.jobs.clone(), job_id);
        self.execute_with_probe(job_id, &probe).await
    }

    async fn execute_with_probe(&self, job_id: i64, cancel: &dyn CancelProbe) -> SyncResult<()> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or(SyncError::JobNotFound { id: job_id })?;

        // at-least-once delivery: a finished job can come around again
        if job.is_terminal() {
            info!(job_id, status = %job.status, "job already finished, skipping");
            return Ok(());
        }

        let job = self.jobs.mark_processing(job_id).await?;
        info!(job_id, job_type = %job.job_type, "job started");

        match self.run_payload(&job, cancel).await {
            Ok(result) => {
                self.jobs.mark_completed(job_id, &result).await?;
                info!(job_id, "job completed");
                Ok(())
            }
            Err(SyncError::Canceled) => {
                // when the probe fired, the cancel service already moved the
                // row; only other probes leave it to us
                match self.jobs.mark_canceled(job_id).await {
                    Ok(_) | Err(SyncError::InvalidJobState { .. }) => {}
                    Err(err) => return Err(err),
                }
                info!(job_id, "job canceled mid-run");
                Ok(())
            }
            Err(err) => {
                let job_error = JobError::from_error(&err);
                if let Err(mark_err) = self.jobs.mark_failed(job_id, &job_error).await {
                    warn!(job_id, error = %mark_err, "could not record job failure");
                }
                error!(job_id, error = %err, "job failed");
                Err(err)
            }
        }
    }

    async fn run_payload(
        &self,
        job: &SyncJob,
        cancel: &dyn CancelProbe,
    ) -> SyncResult<serde_json::Value> {
        match &job.payload {
            JobPayload::RoomsSync {} => {
                let report = self.rooms_sync.run(cancel).await?;
                Ok(serde_json::to_value(report)?)
            }
            JobPayload::MessagesSync {
                room_id,
                room_limit,
            } => {
                let report = self
                    .messages_sync
                    .run(Some(job.id), room_id.as_deref(), *room_limit, cancel)
                    .await?;
                Ok(serde_json::to_value(report)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{message, room, CancelAfter, ScriptedPlatformClient};
    use roomsync_domain::entities::{JobType, RoomDraft};
    use roomsync_domain::repositories::{MessageRepository, RoomRepository};
    use roomsync_infrastructure::memory::{
        InMemoryJobRepository, InMemoryMessageRepository, InMemoryRoomRepository,
    };

    struct Fixture {
        jobs: Arc<InMemoryJobRepository>,
        rooms: Arc<InMemoryRoomRepository>,
        messages: Arc<InMemoryMessageRepository>,
        executor: JobExecutor,
    }

    fn fixture(platform: ScriptedPlatformClient) -> Fixture {
        let jobs = Arc::new(InMemoryJobRepository::new());
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let platform = Arc::new(platform);
        let executor = JobExecutor::new(
            jobs.clone(),
            Arc::new(RoomsSync::new(platform.clone(), rooms.clone())),
            Arc::new(MessagesSync::new(
                platform,
                rooms.clone(),
                messages.clone(),
                jobs.clone(),
            )),
        );
        Fixture {
            jobs,
            rooms,
            messages,
            executor,
        }
    }

    #[tokio::test]
    async fn completes_a_rooms_sync_job() {
        let fx = fixture(
            ScriptedPlatformClient::new()
                .with_rooms(vec![room("ext-1", "Sales"), room("ext-2", "Support")]),
        );
        let job = fx
            .jobs
            .create(JobType::RoomsSync, &JobPayload::rooms_sync(), None)
            .await
            .unwrap();

        fx.executor.execute(job.id).await.unwrap();

        let job = fx.jobs.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        let result = job.result.unwrap();
        assert_eq!(result["created"], 2);
        assert_eq!(result["total"], 2);
    }

    #[tokio::test]
    async fn skips_terminal_job_without_touching_the_platform() {
        let platform = ScriptedPlatformClient::new().with_rooms(vec![room("ext-1", "Sales")]);
        let fx = fixture(platform.clone());
        let job = fx
            .jobs
            .create(JobType::RoomsSync, &JobPayload::rooms_sync(), None)
            .await
            .unwrap();
        fx.jobs.mark_canceled(job.id).await.unwrap();

        fx.executor.execute(job.id).await.unwrap();

        let job = fx.jobs.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Canceled);
        assert_eq!(platform.room_list_calls(), 0);
    }

    #[tokio::test]
    async fn failure_is_recorded_and_reraised() {
        let fx = fixture(ScriptedPlatformClient::new());
        let job = fx
            .jobs
            .create(
                JobType::MessagesSync,
                &JobPayload::messages_sync(Some("ghost".to_string()), None),
                None,
            )
            .await
            .unwrap();

        let err = fx.executor.execute(job.id).await.unwrap_err();
        assert!(matches!(err, SyncError::RoomNotFound { .. }));

        let job = fx.jobs.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert_eq!(error.name, "RoomNotFound");
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn midrun_cancellation_ends_canceled_with_partial_data_kept() {
        let platform = ScriptedPlatformClient::new()
            .with_messages("ext-1", vec![message("1", "a")])
            .with_messages("ext-2", vec![message("2", "b")]);
        let fx = fixture(platform);
        for ext in ["ext-1", "ext-2"] {
            fx.rooms
                .upsert(&RoomDraft {
                    external_id: ext.to_string(),
                    name: ext.to_string(),
                    description: None,
                })
                .await
                .unwrap();
        }
        let job = fx
            .jobs
            .create(
                JobType::MessagesSync,
                &JobPayload::messages_sync(None, None),
                None,
            )
            .await
            .unwrap();

        let cancel = CancelAfter::new(1);
        fx.executor
            .execute_with_probe(job.id, &cancel)
            .await
            .unwrap();

        let job = fx.jobs.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Canceled);
        assert!(job.error.is_none());

        let first = fx.rooms.find_by_external_id("ext-1").await.unwrap().unwrap();
        assert_eq!(fx.messages.count_for_room(first.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn probe_reports_cancellation_from_the_job_row() {
        let jobs: Arc<InMemoryJobRepository> = Arc::new(InMemoryJobRepository::new());
        let job = jobs
            .create(JobType::RoomsSync, &JobPayload::rooms_sync(), None)
            .await
            .unwrap();

        let probe = JobCancelProbe::new(jobs.clone(), job.id);
        probe.checkpoint().await.unwrap();

        jobs.mark_canceled(job.id).await.unwrap();
        let err = probe.checkpoint().await.unwrap_err();
        assert!(matches!(err, SyncError::Canceled));
    }
}
