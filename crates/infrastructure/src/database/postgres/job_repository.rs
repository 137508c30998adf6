use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use roomsync_core::{SyncError, SyncResult};
use roomsync_domain::entities::{JobError, JobPayload, JobType, SyncJob};
use roomsync_domain::repositories::JobRepository;

const JOB_COLUMNS: &str = "id, job_type, status, payload, result, error, user_id, \
     started_at, finished_at, created_at, updated_at";

pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::postgres::PgRow) -> SyncResult<SyncJob> {
        let payload: serde_json::Value = row.try_get("payload")?;
        let error: Option<serde_json::Value> = row.try_get("error")?;
        let error = match error {
            Some(value) => Some(serde_json::from_value::<JobError>(value)?),
            None => None,
        };

        Ok(SyncJob {
            id: row.try_get("id")?,
            job_type: row.try_get("job_type")?,
            status: row.try_get("status")?,
            payload: serde_json::from_value(payload)?,
            result: row.try_get("result")?,
            error,
            user_id: row.try_get("user_id")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Turn a guarded-update miss into the precise error: the row is either
    /// absent or in a state the transition does not allow.
    async fn transition_error(&self, id: i64, attempted: &str) -> SyncError {
        match self.find_by_id(id).await {
            Ok(Some(job)) => SyncError::InvalidJobState {
                id,
                status: job.status.to_string(),
                attempted: attempted.to_string(),
            },
            Ok(None) => SyncError::JobNotFound { id },
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    #[instrument(skip(self, payload), fields(job_type = %job_type))]
    async fn create(
        &self,
        job_type: JobType,
        payload: &JobPayload,
        user_id: Option<i64>,
    ) -> SyncResult<SyncJob> {
        let payload = serde_json::to_value(payload)?;
        let row = sqlx::query(&format!(
            "INSERT INTO sync_jobs (job_type, status, payload, user_id) \
             VALUES ($1, 'queued', $2, $3) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_type)
        .bind(payload)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let job = Self::row_to_job(&row)?;
        debug!(job_id = job.id, "job created");
        Ok(job)
    }

    async fn find_by_id(&self, id: i64) -> SyncResult<Option<SyncJob>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM sync_jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn list_recent(&self, limit: usize) -> SyncResult<Vec<SyncJob>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM sync_jobs ORDER BY id DESC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_job).collect()
    }

    #[instrument(skip(self))]
    async fn mark_processing(&self, id: i64) -> SyncResult<SyncJob> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "UPDATE sync_jobs \
             SET status = 'processing', started_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'queued' \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_job(&row),
            None => Err(self.transition_error(id, "mark processing").await),
        }
    }

    #[instrument(skip(self, result))]
    async fn mark_completed(&self, id: i64, result: &serde_json::Value) -> SyncResult<SyncJob> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "UPDATE sync_jobs \
             SET status = 'completed', result = $2, finished_at = $3, updated_at = $3 \
             WHERE id = $1 AND status = 'processing' \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(result)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_job(&row),
            None => Err(self.transition_error(id, "mark completed").await),
        }
    }

    #[instrument(skip(self, error))]
    async fn mark_failed(&self, id: i64, error: &JobError) -> SyncResult<SyncJob> {
        let now = Utc::now();
        let error = serde_json::to_value(error)?;
        // queued is an allowed source: an enqueue whose queue handoff fails
        // marks the job failed before any worker sees it
        let row = sqlx::query(&format!(
            "UPDATE sync_jobs \
             SET status = 'failed', error = $2, finished_at = $3, updated_at = $3 \
             WHERE id = $1 AND status IN ('queued', 'processing') \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(error)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_job(&row),
            None => Err(self.transition_error(id, "mark failed").await),
        }
    }

    #[instrument(skip(self))]
    async fn mark_canceled(&self, id: i64) -> SyncResult<SyncJob> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "UPDATE sync_jobs \
             SET status = 'canceled', finished_at = $2, updated_at = $2 \
             WHERE id = $1 AND status IN ('queued', 'processing') \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_job(&row),
            None => Err(self.transition_error(id, "cancel").await),
        }
    }

    async fn update_result(&self, id: i64, result: &serde_json::Value) -> SyncResult<()> {
        // Progress flush; once the job left processing this must not touch
        // the row, so a guarded no-op rather than an error
        let updated = sqlx::query(
            "UPDATE sync_jobs SET result = $2, updated_at = $3 \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(result)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            debug!(job_id = id, "progress flush skipped, job no longer processing");
        }

        Ok(())
    }
}
