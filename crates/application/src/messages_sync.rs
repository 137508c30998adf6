use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use roomsync_core::SyncResult;
use roomsync_domain::entities::{MessagesSyncReport, NewMessage, Room};
use roomsync_domain::ports::{CancelProbe, PlatformClient};
use roomsync_domain::repositories::{JobRepository, MessageRepository, RoomRepository};
use roomsync_domain::value_objects::{latest_message_id, truncate_error_message};
use roomsync_domain::SyncError;

/// Pulls message history for one room or for every active room.
///
/// Rooms are processed sequentially. A platform error on one room is
/// recorded against that room and the run continues; storage errors abort
/// the whole run.
pub struct MessagesSync {
    platform: Arc<dyn PlatformClient>,
    rooms: Arc<dyn RoomRepository>,
    messages: Arc<dyn MessageRepository>,
    jobs: Arc<dyn JobRepository>,
}

impl MessagesSync {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        rooms: Arc<dyn RoomRepository>,
        messages: Arc<dyn MessageRepository>,
        jobs: Arc<dyn JobRepository>,
    ) -> Self {
        Self {
            platform,
            rooms,
            messages,
            jobs,
        }
    }

    /// Run the sync. `job_id` enables per-room progress flushes into the
    /// job's result column; pass `None` for detached runs.
    pub async fn run(
        &self,
        job_id: Option<i64>,
        room_id: Option<&str>,
        room_limit: Option<usize>,
        cancel: &dyn CancelProbe,
    ) -> SyncResult<MessagesSyncReport> {
        let targets = self.resolve_targets(room_id, room_limit).await?;
        info!(rooms = targets.len(), "starting messages sync");

        let mut report = MessagesSyncReport::default();
        for room in &targets {
            cancel.checkpoint().await?;
            self.sync_room(room, &mut report).await?;
            self.flush_progress(job_id, &report).await;
        }

        info!(
            synced = report.rooms.len(),
            failed = report.errors.len(),
            "messages sync finished"
        );
        Ok(report)
    }

    async fn resolve_targets(
        &self,
        room_id: Option<&str>,
        room_limit: Option<usize>,
    ) -> SyncResult<Vec<Room>> {
        match room_id {
            Some(external_id) => {
                let room = self.rooms.find_by_external_id(external_id).await?.ok_or(
                    SyncError::RoomNotFound {
                        external_id: external_id.to_string(),
                    },
                )?;
                Ok(vec![room])
            }
            None => self.rooms.list_active(room_limit).await,
        }
    }

    async fn sync_room(&self, room: &Room, report: &mut MessagesSyncReport) -> SyncResult<()> {
        // a room that never synced gets the full history
        let force = room.last_synced_message_id.is_none();

        let fetched = match self.platform.list_messages(&room.external_id, force).await {
            Ok(fetched) => fetched,
            Err(err) => {
                let status = err.platform_status();
                let message = truncate_error_message(&err.to_string());
                warn!(
                    room = %room.external_id,
                    status,
                    "message fetch failed, continuing with remaining rooms"
                );
                self.rooms
                    .record_sync_error(room.id, &message, status, Utc::now())
                    .await?;
                report.record_failure(&room.external_id, message, status);
                return Ok(());
            }
        };

        let company_id = self.company_for_room(room).await?;

        let mut inserted = 0usize;
        for message in &fetched {
            let stored = self
                .messages
                .insert_if_absent(&NewMessage {
                    room_id: room.id,
                    external_id: message.message_id.clone(),
                    sender_id: message.account.account_id.clone(),
                    sender_name: message.account.name.clone(),
                    body: message.body.clone(),
                    sent_at: message.sent_at(),
                    company_id,
                })
                .await?;
            if stored {
                inserted += 1;
            }
        }

        let watermark = latest_message_id(
            room.last_synced_message_id.as_deref(),
            fetched.iter().map(|m| m.message_id.as_str()),
        );
        self.rooms
            .record_sync_success(room.id, watermark.as_deref(), Utc::now())
            .await?;

        debug!(
            room = %room.external_id,
            fetched = fetched.len(),
            inserted,
            "room messages synced"
        );
        report.record_success(&room.external_id, fetched.len(), inserted);
        Ok(())
    }

    /// Auto-assign only when the room is linked to exactly one company;
    /// an ambiguous link is logged and left unassigned.
    async fn company_for_room(&self, room: &Room) -> SyncResult<Option<i64>> {
        let linked = self.rooms.linked_company_ids(room.id).await?;
        match linked.as_slice() {
            [] => Ok(None),
            [company_id] => Ok(Some(*company_id)),
            many => {
                warn!(
                    room = %room.external_id,
                    companies = many.len(),
                    "room linked to multiple companies, skipping company assignment"
                );
                Ok(None)
            }
        }
    }

    async fn flush_progress(&self, job_id: Option<i64>, report: &MessagesSyncReport) {
        let Some(job_id) = job_id else {
            return;
        };
        let value = match serde_json::to_value(report) {
            Ok(value) => value,
            Err(err) => {
                warn!(job_id, error = %err, "could not serialize progress report");
                return;
            }
        };
        // progress is best-effort; a failed flush never aborts the sync
        if let Err(err) = self.jobs.update_result(job_id, &value).await {
            warn!(job_id, error = %err, "progress flush failed");
        }
    }
}
