use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomsync_core::SyncError;

/// Kind of sync work a job performs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobType {
    #[serde(rename = "rooms-sync")]
    RoomsSync,
    #[serde(rename = "messages-sync")]
    MessagesSync,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::RoomsSync => "rooms-sync",
            JobType::MessagesSync => "messages-sync",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl sqlx::Type<sqlx::Postgres> for JobType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for JobType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "rooms-sync" => Ok(JobType::RoomsSync),
            "messages-sync" => Ok(JobType::MessagesSync),
            _ => Err(format!("invalid job type: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for JobType {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// Job lifecycle status. Completed, failed and canceled are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    #[serde(rename = "queued")]
    Queued,
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "canceled")]
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl sqlx::Type<sqlx::Postgres> for JobStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for JobStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "canceled" => Ok(JobStatus::Canceled),
            _ => Err(format!("invalid job status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for JobStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// Typed job input, stored as JSONB. The tag mirrors the job type so the
/// stored payload stays readable on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum JobPayload {
    #[serde(rename = "rooms-sync")]
    RoomsSync {},
    #[serde(rename = "messages-sync")]
    #[serde(rename_all = "camelCase")]
    MessagesSync {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_limit: Option<usize>,
    },
}

impl JobPayload {
    pub fn rooms_sync() -> Self {
        JobPayload::RoomsSync {}
    }

    pub fn messages_sync(room_id: Option<String>, room_limit: Option<usize>) -> Self {
        JobPayload::MessagesSync {
            room_id,
            room_limit,
        }
    }

    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::RoomsSync {} => JobType::RoomsSync,
            JobPayload::MessagesSync { .. } => JobType::MessagesSync,
        }
    }
}

/// Captured failure stored on a failed job. The stack is always stored;
/// hiding it from non-privileged readers happens in [`JobView`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobError {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl JobError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// Capture an error with a best-effort backtrace of the failure site.
    pub fn from_error(err: &SyncError) -> Self {
        Self {
            name: err.kind().to_string(),
            message: err.to_string(),
            stack: Some(std::backtrace::Backtrace::force_capture().to_string()),
        }
    }

    pub fn redacted(&self) -> Self {
        Self {
            name: self.name.clone(),
            message: self.message.clone(),
            stack: None,
        }
    }
}

/// One persisted unit of asynchronous work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub payload: JobPayload,
    pub result: Option<serde_json::Value>,
    pub error: Option<JobError>,
    pub user_id: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncJob {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Cancel is allowed only while the job is queued or processing
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }
}

/// Read model returned to callers. Identical to the stored job except the
/// error stack, which is withheld from non-privileged readers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: i64,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub payload: JobPayload,
    pub result: Option<serde_json::Value>,
    pub error: Option<JobError>,
    pub user_id: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobView {
    pub fn from_job(job: &SyncJob, privileged: bool) -> Self {
        let error = job.error.as_ref().map(|e| {
            if privileged {
                e.clone()
            } else {
                e.redacted()
            }
        });

        Self {
            id: job.id,
            job_type: job.job_type,
            status: job.status,
            payload: job.payload.clone(),
            result: job.result.clone(),
            error,
            user_id: job.user_id,
            started_at: job.started_at,
            finished_at: job.finished_at,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}
