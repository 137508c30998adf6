use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use roomsync_application::{JobService, SyncOptions};
use roomsync_core::{AppConfig, AutoSyncConfig, SyncError, SyncResult};
use roomsync_domain::ports::LockStore;

/// Job ids enqueued by one successful scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickJobs {
    pub rooms_job: i64,
    pub messages_job: i64,
}

/// Interval scheduler that keeps the room mirror fresh.
///
/// Every instance runs the same loop; a shared lock elects one winner per
/// tick, so scaling out the process count never duplicates sync jobs. The
/// lock TTL covers a crashed holder, and release is compare-and-delete so
/// an expired claim cannot delete a successor's.
#[derive(Clone)]
pub struct AutoSyncScheduler {
    service: Arc<JobService>,
    lock_store: Arc<dyn LockStore>,
    auto_sync: AutoSyncConfig,
    worker_enabled: bool,
    platform_ready: bool,
    lock_key: String,
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
    is_running: Arc<RwLock<bool>>,
}

impl AutoSyncScheduler {
    pub fn new(
        service: Arc<JobService>,
        lock_store: Arc<dyn LockStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            service,
            lock_store,
            auto_sync: config.auto_sync.clone(),
            worker_enabled: config.worker.enabled,
            platform_ready: config.platform.credentials_configured(),
            lock_key: config.lock.lock_key("auto-sync"),
            shutdown_tx: Arc::new(RwLock::new(None)),
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Start the interval loop. Returns `Ok(false)` when a precondition
    /// keeps the scheduler disabled; that is a normal deployment state,
    /// not an error.
    pub async fn start(&self) -> SyncResult<bool> {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return Err(SyncError::Internal(
                "auto-sync scheduler already running".to_string(),
            ));
        }

        if !self.preconditions_met().await {
            return Ok(false);
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        {
            let mut tx = self.shutdown_tx.write().await;
            *tx = Some(shutdown_tx);
        }

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_loop(shutdown_rx).await;
        });

        *is_running = true;
        info!(
            interval_seconds = self.auto_sync.interval_seconds,
            "auto-sync scheduler started"
        );
        Ok(true)
    }

    pub async fn stop(&self) {
        let mut is_running = self.is_running.write().await;
        if !*is_running {
            return;
        }

        {
            let tx = self.shutdown_tx.read().await;
            if let Some(shutdown_tx) = tx.as_ref() {
                let _ = shutdown_tx.send(());
            }
        }

        *is_running = false;
        info!("auto-sync scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    async fn preconditions_met(&self) -> bool {
        if !self.auto_sync.enabled {
            info!("auto-sync is disabled by configuration");
            return false;
        }
        if !self.worker_enabled {
            warn!("auto-sync disabled: worker backend is disabled, jobs would never run");
            return false;
        }
        if !self.platform_ready {
            warn!("auto-sync disabled: platform credentials are not configured");
            return false;
        }
        if let Err(err) = self.lock_store.ping().await {
            warn!(error = %err, "auto-sync disabled: lock store unreachable");
            return false;
        }
        true
    }

    async fn run_loop(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut tick_interval = interval(self.auto_sync.interval());

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if let Err(err) = self.tick().await {
                        error!(error = %err, "auto-sync tick failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("auto-sync loop received shutdown signal");
                    break;
                }
            }
        }
    }

    /// One scheduling pass: claim the cross-process lock, enqueue a
    /// rooms-sync and a messages-sync job, release the lock. `Ok(None)`
    /// means another instance won this tick.
    pub async fn tick(&self) -> SyncResult<Option<TickJobs>> {
        let token = Uuid::new_v4().to_string();
        let acquired = self
            .lock_store
            .acquire(&self.lock_key, &token, self.auto_sync.lock_ttl())
            .await?;
        if !acquired {
            debug!("another instance holds the auto-sync lock, skipping tick");
            return Ok(None);
        }

        let outcome = self.enqueue_round().await;

        match self.lock_store.release(&self.lock_key, &token).await {
            Ok(true) => {}
            Ok(false) => debug!("auto-sync lock was already gone at release"),
            Err(err) => {
                warn!(error = %err, "auto-sync lock release failed, ttl will reclaim it")
            }
        }

        let jobs = outcome?;
        info!(
            rooms_job = jobs.rooms_job,
            messages_job = jobs.messages_job,
            "auto-sync tick enqueued jobs"
        );
        Ok(Some(jobs))
    }

    async fn enqueue_round(&self) -> SyncResult<TickJobs> {
        let rooms_job = self.service.enqueue_rooms_sync(None).await?;
        let messages_job = self
            .service
            .enqueue_messages_sync(
                None,
                None,
                SyncOptions {
                    room_limit: self.auto_sync.room_limit,
                },
            )
            .await?;
        Ok(TickJobs {
            rooms_job: rooms_job.id,
            messages_job: messages_job.id,
        })
    }
}
