pub mod reports;
pub mod room;
pub mod sync_job;

pub use reports::{MessagesSyncReport, RoomFetchCount, RoomSyncFailure, RoomsSyncReport};
pub use room::{NewMessage, Room, RoomDraft, RoomMessage, UpsertOutcome};
pub use sync_job::{JobError, JobPayload, JobStatus, JobType, JobView, SyncJob};
