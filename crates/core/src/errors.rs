use thiserror::Error;

/// Unified error type for the sync engine
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("job not found: {id}")]
    JobNotFound { id: i64 },

    #[error("room not found: {external_id}")]
    RoomNotFound { external_id: String },

    #[error("job {id} is {status}, cannot {attempted}")]
    InvalidJobState {
        id: i64,
        status: String,
        attempted: String,
    },

    #[error("queue error: {0}")]
    Queue(String),

    #[error("lock store error: {0}")]
    Lock(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("platform API error: status {status}: {body}")]
    PlatformApi { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("job canceled")]
    Canceled,

    #[error("summarization error: {0}")]
    Summary(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Short machine-friendly name for the variant, used when persisting
    /// job failures.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Database(_) => "Database",
            SyncError::JobNotFound { .. } => "JobNotFound",
            SyncError::RoomNotFound { .. } => "RoomNotFound",
            SyncError::InvalidJobState { .. } => "InvalidJobState",
            SyncError::Queue(_) => "Queue",
            SyncError::Lock(_) => "Lock",
            SyncError::Serialization(_) => "Serialization",
            SyncError::Configuration(_) => "Configuration",
            SyncError::PlatformApi { .. } => "PlatformApi",
            SyncError::Transport(_) => "Transport",
            SyncError::Canceled => "Canceled",
            SyncError::Summary(_) => "Summary",
            SyncError::Internal(_) => "Internal",
        }
    }

    /// HTTP status carried by the error, when the platform reported one.
    pub fn platform_status(&self) -> Option<u16> {
        match self {
            SyncError::PlatformApi { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

/// Unified Result type
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = SyncError::PlatformApi {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.kind(), "PlatformApi");
        assert_eq!(err.platform_status(), Some(502));
        assert_eq!(SyncError::Canceled.kind(), "Canceled");
        assert_eq!(SyncError::Canceled.platform_status(), None);
    }

    #[test]
    fn display_includes_context() {
        let err = SyncError::InvalidJobState {
            id: 7,
            status: "completed".to_string(),
            attempted: "cancel".to_string(),
        };
        assert_eq!(err.to_string(), "job 7 is completed, cannot cancel");
    }
}
