use serde::{Deserialize, Serialize};

use super::room::UpsertOutcome;

/// Aggregate result of one rooms-sync run, stored as the job result
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoomsSyncReport {
    pub created: usize,
    pub updated: usize,
    pub total: usize,
}

impl RoomsSyncReport {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
        self.total += 1;
    }
}

/// Per-room fetch count inside a messages-sync result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomFetchCount {
    pub room_id: String,
    pub fetched: usize,
    pub inserted: usize,
}

/// Per-room failure inside a messages-sync result. These are data, not
/// control flow; the run keeps going.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSyncFailure {
    pub room_id: String,
    pub message: String,
    pub status: Option<u16>,
}

/// Result of one messages-sync run. Both fields are serialized even when
/// empty so readers can rely on their presence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessagesSyncReport {
    pub rooms: Vec<RoomFetchCount>,
    pub errors: Vec<RoomSyncFailure>,
}

impl MessagesSyncReport {
    pub fn record_success(&mut self, room_id: impl Into<String>, fetched: usize, inserted: usize) {
        self.rooms.push(RoomFetchCount {
            room_id: room_id.into(),
            fetched,
            inserted,
        });
    }

    pub fn record_failure(
        &mut self,
        room_id: impl Into<String>,
        message: impl Into<String>,
        status: Option<u16>,
    ) {
        self.errors.push(RoomSyncFailure {
            room_id: room_id.into(),
            message: message.into(),
            status,
        });
    }
}
