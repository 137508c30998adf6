use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomsync_core::SyncResult;

/// Room as the external platform returns it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformRoom {
    pub room_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformAccount {
    pub account_id: String,
    pub name: String,
}

/// Message as the external platform returns it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformMessage {
    pub message_id: String,
    pub account: PlatformAccount,
    pub body: String,
    /// Epoch seconds
    pub send_time: i64,
}

impl PlatformMessage {
    pub fn sent_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.send_time, 0).unwrap_or_else(Utc::now)
    }
}

/// Client for the external messaging platform.
///
/// `force` requests full history; an incremental fetch relies on the
/// platform's own windowing from the room's last known state.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn list_rooms(&self) -> SyncResult<Vec<PlatformRoom>>;

    async fn list_messages(
        &self,
        room_external_id: &str,
        force: bool,
    ) -> SyncResult<Vec<PlatformMessage>>;
}
