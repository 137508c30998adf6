use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Locally mirrored external conversation channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    /// Incremental-fetch watermark; may encode an integer larger than u64
    pub last_synced_message_id: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
    pub last_error_status: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for the idempotent room upsert, keyed by external id
#[derive(Debug, Clone, PartialEq)]
pub struct RoomDraft {
    pub external_id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Which branch an upsert took. Reported by the repository itself rather
/// than inferred from timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Message mirrored from the external platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMessage {
    pub id: i64,
    pub room_id: i64,
    pub external_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub company_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Insert form for [`RoomMessage`]; duplicates on (room_id, external_id)
/// are skipped, not errors.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room_id: i64,
    pub external_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub company_id: Option<i64>,
}
