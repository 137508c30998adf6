use std::sync::Arc;

use tracing::info;

use roomsync_core::SyncResult;
use roomsync_domain::entities::{RoomDraft, RoomsSyncReport};
use roomsync_domain::ports::{CancelProbe, PlatformClient};
use roomsync_domain::repositories::RoomRepository;

/// Pulls the full room list from the platform and mirrors it locally.
///
/// Rooms are keyed by their platform id; re-running against an unchanged
/// platform only touches `updated_at`, so the sync is safe to repeat.
pub struct RoomsSync {
    platform: Arc<dyn PlatformClient>,
    rooms: Arc<dyn RoomRepository>,
}

impl RoomsSync {
    pub fn new(platform: Arc<dyn PlatformClient>, rooms: Arc<dyn RoomRepository>) -> Self {
        Self { platform, rooms }
    }

    pub async fn run(&self, cancel: &dyn CancelProbe) -> SyncResult<RoomsSyncReport> {
        let fetched = self.platform.list_rooms().await?;
        info!(count = fetched.len(), "fetched room list from platform");

        let mut report = RoomsSyncReport::default();
        for room in &fetched {
            cancel.checkpoint().await?;

            let outcome = self
                .rooms
                .upsert(&RoomDraft {
                    external_id: room.room_id.clone(),
                    name: room.name.clone(),
                    description: room.description.clone(),
                })
                .await?;
            report.record(outcome);
        }

        info!(
            created = report.created,
            updated = report.updated,
            total = report.total,
            "rooms sync finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{room, CancelAfter, ScriptedPlatformClient};
    use roomsync_core::SyncError;
    use roomsync_domain::ports::NeverCanceled;
    use roomsync_infrastructure::memory::InMemoryRoomRepository;

    #[tokio::test]
    async fn repeat_run_updates_instead_of_duplicating() {
        let platform = Arc::new(
            ScriptedPlatformClient::new()
                .with_rooms(vec![room("ext-1", "Sales"), room("ext-2", "Support")]),
        );
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let sync = RoomsSync::new(platform, rooms.clone());

        let first = sync.run(&NeverCanceled).await.unwrap();
        assert_eq!((first.created, first.updated, first.total), (2, 0, 2));

        let second = sync.run(&NeverCanceled).await.unwrap();
        assert_eq!((second.created, second.updated, second.total), (0, 2, 2));

        assert_eq!(rooms.list_active(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_between_rooms() {
        let platform = Arc::new(ScriptedPlatformClient::new().with_rooms(vec![
            room("ext-1", "Sales"),
            room("ext-2", "Support"),
            room("ext-3", "Ops"),
        ]));
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let sync = RoomsSync::new(platform, rooms.clone());

        let cancel = CancelAfter::new(1);
        let err = sync.run(&cancel).await.unwrap_err();
        assert!(matches!(err, SyncError::Canceled));

        // the room processed before the canceled checkpoint was kept
        assert_eq!(rooms.list_active(None).await.unwrap().len(), 1);
    }
}
