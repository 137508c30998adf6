use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use roomsync_core::AutoSyncConfig;
use roomsync_domain::entities::Room;
use roomsync_domain::repositories::RoomRepository;

use crate::job_service::{JobService, SyncOptions};

/// Refreshes a company's rooms when someone opens its record.
///
/// The trigger runs detached so page loads never wait on sync work, and
/// the eligibility policy keeps it from hammering the platform for rooms
/// that were synced a moment ago.
pub struct OnDemandTrigger {
    rooms: Arc<dyn RoomRepository>,
    service: Arc<JobService>,
    min_interval: Duration,
    room_cap: usize,
}

impl OnDemandTrigger {
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        service: Arc<JobService>,
        config: &AutoSyncConfig,
    ) -> Self {
        Self {
            rooms,
            service,
            min_interval: config.min_refresh_interval(),
            room_cap: config.trigger_room_cap,
        }
    }

    /// Fire-and-forget refresh of every stale room linked to the company.
    /// Failures are logged; the caller never sees them.
    pub fn refresh_company_rooms(&self, company_id: i64) -> JoinHandle<()> {
        let rooms = self.rooms.clone();
        let service = self.service.clone();
        let min_interval = self.min_interval;
        let room_cap = self.room_cap;

        tokio::spawn(async move {
            let linked = match rooms.list_for_company(company_id).await {
                Ok(linked) => linked,
                Err(err) => {
                    warn!(company_id, error = %err, "could not load linked rooms");
                    return;
                }
            };

            let due = eligible_rooms(linked, Utc::now(), min_interval, room_cap);
            if due.is_empty() {
                debug!(company_id, "no rooms due for refresh");
                return;
            }

            info!(company_id, rooms = due.len(), "refreshing company rooms");
            for room in due {
                if let Err(err) = service
                    .enqueue_messages_sync(
                        Some(room.external_id.clone()),
                        None,
                        SyncOptions::default(),
                    )
                    .await
                {
                    warn!(
                        company_id,
                        room = %room.external_id,
                        error = %err,
                        "room refresh enqueue failed"
                    );
                }
            }
        })
    }
}

/// Which rooms are due for a refresh right now.
///
/// Inactive rooms never qualify. A room whose last failure was a rate
/// limit stays quiet for a full interval. The rest qualify when they have
/// never synced or their last sync is at least `min_interval` old, stalest
/// first, capped at `cap`.
pub fn eligible_rooms(
    rooms: Vec<Room>,
    now: DateTime<Utc>,
    min_interval: Duration,
    cap: usize,
) -> Vec<Room> {
    let mut due: Vec<Room> = rooms
        .into_iter()
        .filter(|room| room.active)
        .filter(|room| !in_rate_limit_cooldown(room, now, min_interval))
        .filter(|room| match room.last_sync_at {
            None => true,
            Some(at) => (now - at)
                .to_std()
                .map(|age| age >= min_interval)
                .unwrap_or(false),
        })
        .collect();

    due.sort_by(|a, b| match (a.last_sync_at, b.last_sync_at) {
        (None, None) => a.id.cmp(&b.id),
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y).then(a.id.cmp(&b.id)),
    });
    due.truncate(cap);
    due
}

fn in_rate_limit_cooldown(room: &Room, now: DateTime<Utc>, min_interval: Duration) -> bool {
    if room.last_error_status != Some(429) {
        return false;
    }
    match room.last_error_at {
        Some(at) => (now - at)
            .to_std()
            .map(|age| age < min_interval)
            .unwrap_or(true),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::JobExecutor;
    use crate::messages_sync::MessagesSync;
    use crate::rooms_sync::RoomsSync;
    use crate::test_utils::{room_record, ScriptedPlatformClient};
    use chrono::Duration as ChronoDuration;
    use roomsync_core::Environment;
    use roomsync_domain::entities::{JobPayload, JobType, RoomDraft};
    use roomsync_domain::repositories::JobRepository;
    use roomsync_infrastructure::memory::{
        InMemoryJobRepository, InMemoryMessageRepository, InMemoryRoomRepository,
    };
    use roomsync_infrastructure::queue::InMemoryJobQueue;

    const MIN: Duration = Duration::from_secs(300);

    #[test]
    fn inactive_rooms_never_qualify() {
        let now = Utc::now();
        let mut inactive = room_record(1, "ext-1");
        inactive.active = false;

        assert!(eligible_rooms(vec![inactive], now, MIN, 10).is_empty());
    }

    #[test]
    fn recently_synced_rooms_wait_out_the_interval() {
        let now = Utc::now();
        let mut fresh = room_record(1, "ext-1");
        fresh.last_sync_at = Some(now - ChronoDuration::seconds(10));
        let mut stale = room_record(2, "ext-2");
        stale.last_sync_at = Some(now - ChronoDuration::seconds(301));

        let due = eligible_rooms(vec![fresh, stale], now, MIN, 10);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].external_id, "ext-2");
    }

    #[test]
    fn rate_limited_rooms_stay_quiet_for_an_interval() {
        let now = Utc::now();
        let mut limited = room_record(1, "ext-1");
        limited.last_error_status = Some(429);
        limited.last_error_at = Some(now - ChronoDuration::seconds(30));
        let mut recovered = room_record(2, "ext-2");
        recovered.last_error_status = Some(429);
        recovered.last_error_at = Some(now - ChronoDuration::seconds(400));
        // a plain server error does not cool the room down
        let mut flaky = room_record(3, "ext-3");
        flaky.last_error_status = Some(500);
        flaky.last_error_at = Some(now - ChronoDuration::seconds(30));

        let due = eligible_rooms(vec![limited, recovered, flaky], now, MIN, 10);
        let ids: Vec<&str> = due.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["ext-2", "ext-3"]);
    }

    #[test]
    fn stalest_rooms_come_first_and_the_cap_applies() {
        let now = Utc::now();
        let mut synced_long_ago = room_record(1, "ext-1");
        synced_long_ago.last_sync_at = Some(now - ChronoDuration::hours(2));
        let never_synced = room_record(2, "ext-2");
        let mut synced_recently_enough = room_record(3, "ext-3");
        synced_recently_enough.last_sync_at = Some(now - ChronoDuration::hours(1));

        let due = eligible_rooms(
            vec![synced_long_ago, never_synced, synced_recently_enough],
            now,
            MIN,
            2,
        );
        let ids: Vec<&str> = due.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["ext-2", "ext-1"]);
    }

    fn trigger_fixture(
        queue: Arc<InMemoryJobQueue>,
    ) -> (Arc<InMemoryRoomRepository>, Arc<InMemoryJobRepository>, OnDemandTrigger) {
        let jobs = Arc::new(InMemoryJobRepository::new());
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let platform = Arc::new(ScriptedPlatformClient::new());
        let executor = Arc::new(JobExecutor::new(
            jobs.clone(),
            Arc::new(RoomsSync::new(platform.clone(), rooms.clone())),
            Arc::new(MessagesSync::new(
                platform,
                rooms.clone(),
                messages,
                jobs.clone(),
            )),
        ));
        let service = Arc::new(JobService::new(
            jobs.clone(),
            Some(queue),
            executor,
            Environment::Development,
        ));
        let config = AutoSyncConfig {
            enabled: true,
            interval_seconds: 300,
            room_limit: None,
            trigger_room_cap: 10,
        };
        let trigger = OnDemandTrigger::new(rooms.clone(), service, &config);
        (rooms, jobs, trigger)
    }

    #[tokio::test]
    async fn refresh_enqueues_one_job_per_due_room() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let (rooms, jobs, trigger) = trigger_fixture(queue.clone());

        for ext in ["ext-1", "ext-2"] {
            rooms
                .upsert(&RoomDraft {
                    external_id: ext.to_string(),
                    name: ext.to_string(),
                    description: None,
                })
                .await
                .unwrap();
        }
        let due = rooms.find_by_external_id("ext-1").await.unwrap().unwrap();
        let fresh = rooms.find_by_external_id("ext-2").await.unwrap().unwrap();
        rooms
            .record_sync_success(fresh.id, None, Utc::now())
            .await
            .unwrap();
        rooms.link_company(due.id, 9).await;
        rooms.link_company(fresh.id, 9).await;

        trigger.refresh_company_rooms(9).await.unwrap();

        assert_eq!(queue.len().await, 1);
        let created = jobs.list_recent(10).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].job_type, JobType::MessagesSync);
        assert_eq!(
            created[0].payload,
            JobPayload::messages_sync(Some("ext-1".to_string()), None)
        );
    }

    #[tokio::test]
    async fn refresh_for_unlinked_company_does_nothing() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let (_rooms, jobs, trigger) = trigger_fixture(queue.clone());

        trigger.refresh_company_rooms(404).await.unwrap();

        assert!(queue.is_empty().await);
        assert!(jobs.list_recent(10).await.unwrap().is_empty());
    }
}
