use std::sync::Arc;

use tracing::{debug, error, info, warn};

use roomsync_core::{Environment, SyncError, SyncResult};
use roomsync_domain::entities::{JobError, JobPayload, JobView, SyncJob};
use roomsync_domain::ports::{JobEnvelope, JobQueue};
use roomsync_domain::repositories::JobRepository;

use crate::executor::JobExecutor;

/// Caller-facing knobs for a messages-sync run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub room_limit: Option<usize>,
}

/// Entry point for creating, canceling and reading sync jobs.
///
/// Jobs are created `queued` and handed to the work queue. Without a queue
/// the service degrades to inline execution, except in production where a
/// missing queue is a configuration fault.
pub struct JobService {
    jobs: Arc<dyn JobRepository>,
    queue: Option<Arc<dyn JobQueue>>,
    executor: Arc<JobExecutor>,
    environment: Environment,
}

impl JobService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        queue: Option<Arc<dyn JobQueue>>,
        executor: Arc<JobExecutor>,
        environment: Environment,
    ) -> Self {
        Self {
            jobs,
            queue,
            executor,
            environment,
        }
    }

    pub async fn enqueue_rooms_sync(&self, user_id: Option<i64>) -> SyncResult<SyncJob> {
        self.enqueue(JobPayload::rooms_sync(), user_id).await
    }

    pub async fn enqueue_messages_sync(
        &self,
        room_id: Option<String>,
        user_id: Option<i64>,
        options: SyncOptions,
    ) -> SyncResult<SyncJob> {
        self.enqueue(JobPayload::messages_sync(room_id, options.room_limit), user_id)
            .await
    }

    async fn enqueue(&self, payload: JobPayload, user_id: Option<i64>) -> SyncResult<SyncJob> {
        let job = self.jobs.create(payload.job_type(), &payload, user_id).await?;
        info!(job_id = job.id, job_type = %job.job_type, "job created");

        match &self.queue {
            Some(queue) => {
                let envelope = JobEnvelope {
                    job_id: job.id,
                    job_type: job.job_type,
                };
                if let Err(err) = queue.publish(&envelope).await {
                    error!(job_id = job.id, error = %err, "queue handoff failed");
                    self.record_handoff_failure(job.id, &err).await;
                    return Err(err);
                }
                debug!(job_id = job.id, "job published to queue");
                Ok(job)
            }
            None if self.environment.is_production() => {
                let err = SyncError::Configuration(
                    "job queue is required in production".to_string(),
                );
                error!(job_id = job.id, "no job queue configured in production");
                self.record_handoff_failure(job.id, &err).await;
                Err(err)
            }
            None => {
                warn!(
                    job_id = job.id,
                    environment = %self.environment,
                    "no job queue configured, executing inline"
                );
                // the executor records any failure on the row itself
                self.executor.execute(job.id).await?;
                self.jobs
                    .find_by_id(job.id)
                    .await?
                    .ok_or(SyncError::JobNotFound { id: job.id })
            }
        }
    }

    /// Cancel a job. `Ok(None)` when no such job exists; `InvalidJobState`
    /// when it already finished. A queued envelope is removed best-effort;
    /// a running job stops at its next checkpoint.
    pub async fn cancel(&self, job_id: i64) -> SyncResult<Option<SyncJob>> {
        let Some(job) = self.jobs.find_by_id(job_id).await? else {
            return Ok(None);
        };
        if !job.can_cancel() {
            return Err(SyncError::InvalidJobState {
                id: job_id,
                status: job.status.to_string(),
                attempted: "cancel".to_string(),
            });
        }

        let canceled = self.jobs.mark_canceled(job_id).await?;

        if let Some(queue) = &self.queue {
            match queue.remove_pending(job_id).await {
                Ok(removed) => debug!(job_id, removed, "pending envelope removal"),
                Err(err) => warn!(job_id, error = %err, "pending envelope removal failed"),
            }
        }

        info!(job_id, "job canceled");
        Ok(Some(canceled))
    }

    pub async fn get(&self, job_id: i64, privileged: bool) -> SyncResult<Option<JobView>> {
        Ok(self
            .jobs
            .find_by_id(job_id)
            .await?
            .map(|job| JobView::from_job(&job, privileged)))
    }

    pub async fn list(&self, limit: usize, privileged: bool) -> SyncResult<Vec<JobView>> {
        Ok(self
            .jobs
            .list_recent(limit)
            .await?
            .iter()
            .map(|job| JobView::from_job(job, privileged))
            .collect())
    }

    async fn record_handoff_failure(&self, job_id: i64, err: &SyncError) {
        let job_error = JobError::from_error(err);
        if let Err(mark_err) = self.jobs.mark_failed(job_id, &job_error).await {
            warn!(job_id, error = %mark_err, "could not record handoff failure");
        }
    }
}
