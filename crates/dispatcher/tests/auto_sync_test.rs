#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use roomsync_application::{JobExecutor, JobService, MessagesSync, RoomsSync};
    use roomsync_core::{AppConfig, Environment, SyncError, SyncResult};
    use roomsync_dispatcher::AutoSyncScheduler;
    use roomsync_domain::entities::{JobPayload, JobType};
    use roomsync_domain::ports::{
        JobEnvelope, JobQueue, LockStore, PlatformClient, PlatformMessage, PlatformRoom,
        QueuedDelivery,
    };
    use roomsync_domain::repositories::JobRepository;
    use roomsync_infrastructure::lock::InMemoryLockStore;
    use roomsync_infrastructure::memory::{
        InMemoryJobRepository, InMemoryMessageRepository, InMemoryRoomRepository,
    };
    use roomsync_infrastructure::queue::InMemoryJobQueue;

    /// Scheduler tests only enqueue; the platform is never reached
    struct IdlePlatform;

    #[async_trait]
    impl PlatformClient for IdlePlatform {
        async fn list_rooms(&self) -> SyncResult<Vec<PlatformRoom>> {
            Ok(Vec::new())
        }

        async fn list_messages(
            &self,
            _room_external_id: &str,
            _force: bool,
        ) -> SyncResult<Vec<PlatformMessage>> {
            Ok(Vec::new())
        }
    }

    struct FailingQueue;

    #[async_trait]
    impl JobQueue for FailingQueue {
        async fn publish(&self, _envelope: &JobEnvelope) -> SyncResult<()> {
            Err(SyncError::Queue("broker unavailable".to_string()))
        }

        async fn poll(&self) -> SyncResult<Option<QueuedDelivery>> {
            Ok(None)
        }

        async fn ack(&self, _delivery: &QueuedDelivery) -> SyncResult<()> {
            Ok(())
        }

        async fn nack(&self, _delivery: &QueuedDelivery, _requeue: bool) -> SyncResult<()> {
            Ok(())
        }

        async fn remove_pending(&self, _job_id: i64) -> SyncResult<bool> {
            Ok(false)
        }
    }

    struct UnreachableLockStore;

    #[async_trait]
    impl LockStore for UnreachableLockStore {
        async fn acquire(&self, _key: &str, _token: &str, _ttl: Duration) -> SyncResult<bool> {
            Err(SyncError::Lock("connection refused".to_string()))
        }

        async fn release(&self, _key: &str, _token: &str) -> SyncResult<bool> {
            Err(SyncError::Lock("connection refused".to_string()))
        }

        async fn ping(&self) -> SyncResult<()> {
            Err(SyncError::Lock("connection refused".to_string()))
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auto_sync.enabled = true;
        config.auto_sync.interval_seconds = 1;
        config.auto_sync.room_limit = Some(25);
        config.platform.api_token = Some("token".to_string());
        config
    }

    fn build_service(queue: Arc<dyn JobQueue>) -> (Arc<InMemoryJobRepository>, Arc<JobService>) {
        let jobs = Arc::new(InMemoryJobRepository::new());
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let platform = Arc::new(IdlePlatform);
        let executor = Arc::new(JobExecutor::new(
            jobs.clone(),
            Arc::new(RoomsSync::new(platform.clone(), rooms.clone())),
            Arc::new(MessagesSync::new(platform, rooms, messages, jobs.clone())),
        ));
        let service = Arc::new(JobService::new(
            jobs.clone(),
            Some(queue),
            executor,
            Environment::Development,
        ));
        (jobs, service)
    }

    #[tokio::test]
    async fn tick_enqueues_rooms_sync_then_messages_sync() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let (jobs, service) = build_service(queue.clone());
        let lock = Arc::new(InMemoryLockStore::new());
        let scheduler = AutoSyncScheduler::new(service, lock, &test_config());

        let enqueued = scheduler.tick().await.unwrap().unwrap();
        assert!(enqueued.rooms_job < enqueued.messages_job);
        assert_eq!(queue.len().await, 2);

        // newest first
        let created = jobs.list_recent(10).await.unwrap();
        assert_eq!(created[1].job_type, JobType::RoomsSync);
        assert_eq!(created[0].job_type, JobType::MessagesSync);
        assert_eq!(
            created[0].payload,
            JobPayload::messages_sync(None, Some(25))
        );

        // the lock was released, so the next tick wins again
        assert!(scheduler.tick().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn tick_yields_when_another_instance_holds_the_lock() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let (jobs, service) = build_service(queue.clone());
        let lock = Arc::new(InMemoryLockStore::new());
        let config = test_config();

        let held = lock
            .acquire(
                &config.lock.lock_key("auto-sync"),
                "other-instance",
                Duration::from_secs(600),
            )
            .await
            .unwrap();
        assert!(held);

        let scheduler = AutoSyncScheduler::new(service, lock, &config);
        assert!(scheduler.tick().await.unwrap().is_none());

        // the loser enqueued nothing
        assert!(queue.is_empty().await);
        assert!(jobs.list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tick_releases_the_lock_when_enqueue_fails() {
        let (_jobs, service) = build_service(Arc::new(FailingQueue));
        let lock = Arc::new(InMemoryLockStore::new());
        let config = test_config();
        let scheduler = AutoSyncScheduler::new(service, lock.clone(), &config);

        let err = scheduler.tick().await.unwrap_err();
        assert!(matches!(err, SyncError::Queue(_)));

        // a ttl-length wait is not needed; release already happened
        let reacquired = lock
            .acquire(
                &config.lock.lock_key("auto-sync"),
                "next-round",
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert!(reacquired);
    }

    #[tokio::test]
    async fn disabled_configuration_keeps_the_scheduler_stopped() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let (_jobs, service) = build_service(queue);
        let lock = Arc::new(InMemoryLockStore::new());

        let mut config = test_config();
        config.auto_sync.enabled = false;

        let scheduler = AutoSyncScheduler::new(service, lock, &config);
        assert!(!scheduler.start().await.unwrap());
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test]
    async fn missing_platform_credentials_keep_the_scheduler_stopped() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let (_jobs, service) = build_service(queue);
        let lock = Arc::new(InMemoryLockStore::new());

        let mut config = test_config();
        config.platform.api_token = None;

        let scheduler = AutoSyncScheduler::new(service, lock, &config);
        assert!(!scheduler.start().await.unwrap());
    }

    #[tokio::test]
    async fn disabled_worker_backend_keeps_the_scheduler_stopped() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let (_jobs, service) = build_service(queue);
        let lock = Arc::new(InMemoryLockStore::new());

        let mut config = test_config();
        config.worker.enabled = false;

        let scheduler = AutoSyncScheduler::new(service, lock, &config);
        assert!(!scheduler.start().await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_lock_store_keeps_the_scheduler_stopped() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let (_jobs, service) = build_service(queue);

        let scheduler =
            AutoSyncScheduler::new(service, Arc::new(UnreachableLockStore), &test_config());
        assert!(!scheduler.start().await.unwrap());
    }

    #[tokio::test]
    async fn started_scheduler_ticks_and_stops_cleanly() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let (_jobs, service) = build_service(queue.clone());
        let lock = Arc::new(InMemoryLockStore::new());
        let scheduler = AutoSyncScheduler::new(service, lock, &test_config());

        assert!(scheduler.start().await.unwrap());
        assert!(scheduler.is_running().await);
        assert!(matches!(
            scheduler.start().await,
            Err(SyncError::Internal(_))
        ));

        // the first interval tick fires immediately
        let mut waited = 0;
        while queue.len().await < 2 && waited < 100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert_eq!(queue.len().await, 2);

        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
    }
}
