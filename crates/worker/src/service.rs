use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock, Semaphore};
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use roomsync_application::JobExecutor;
use roomsync_core::{SyncError, SyncResult, WorkerConfig};
use roomsync_domain::ports::{JobQueue, QueuedDelivery};

const MAX_DRAIN_ATTEMPTS: u32 = 30;

/// Builder for [`WorkerService`]
pub struct WorkerServiceBuilder {
    worker_id: String,
    queue: Arc<dyn JobQueue>,
    executor: Arc<JobExecutor>,
    max_concurrent_jobs: usize,
    poll_interval: Duration,
}

impl WorkerServiceBuilder {
    pub fn new(queue: Arc<dyn JobQueue>, executor: Arc<JobExecutor>) -> Self {
        Self {
            worker_id: default_worker_id(),
            queue,
            executor,
            max_concurrent_jobs: 4,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn worker_id(mut self, worker_id: String) -> Self {
        self.worker_id = worker_id;
        self
    }

    pub fn max_concurrent_jobs(mut self, max_concurrent_jobs: usize) -> Self {
        self.max_concurrent_jobs = max_concurrent_jobs;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Take the pool size and poll interval from the worker config section
    pub fn from_config(self, config: &WorkerConfig) -> Self {
        self.max_concurrent_jobs(config.max_concurrent_jobs)
            .poll_interval(config.poll_interval())
    }

    pub fn build(self) -> WorkerService {
        WorkerService {
            worker_id: self.worker_id,
            queue: self.queue,
            executor: self.executor,
            max_concurrent_jobs: self.max_concurrent_jobs,
            poll_interval: self.poll_interval,
            slots: Arc::new(Semaphore::new(self.max_concurrent_jobs)),
            shutdown_tx: Arc::new(RwLock::new(None)),
            is_running: Arc::new(RwLock::new(false)),
        }
    }
}

/// Hostname plus a short random suffix, so co-located workers stay apart
fn default_worker_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{host}-{}", &suffix[..8])
}

/// Polling worker that drains the job queue into the executor.
///
/// A semaphore bounds in-flight jobs at `max_concurrent_jobs`; each claimed
/// envelope runs on its own task holding one permit. The executor's return
/// value drives the queue signal: `Ok` acks (success, cancellation or a
/// redelivered terminal job), `Err` nacks without requeue since the failure
/// is already recorded on the job row.
pub struct WorkerService {
    worker_id: String,
    queue: Arc<dyn JobQueue>,
    executor: Arc<JobExecutor>,
    max_concurrent_jobs: usize,
    poll_interval: Duration,
    slots: Arc<Semaphore>,
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
    is_running: Arc<RwLock<bool>>,
}

impl WorkerService {
    pub fn builder(queue: Arc<dyn JobQueue>, executor: Arc<JobExecutor>) -> WorkerServiceBuilder {
        WorkerServiceBuilder::new(queue, executor)
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Jobs currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.max_concurrent_jobs - self.slots.available_permits()
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn start(&self) -> SyncResult<()> {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return Err(SyncError::Internal(
                "worker service already running".to_string(),
            ));
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        {
            let mut tx = self.shutdown_tx.write().await;
            *tx = Some(shutdown_tx);
        }

        let service = self.clone();
        tokio::spawn(async move {
            service.run_loop(shutdown_rx).await;
        });

        *is_running = true;
        info!(
            worker_id = %self.worker_id,
            max_concurrent_jobs = self.max_concurrent_jobs,
            "worker service started"
        );
        Ok(())
    }

    /// Signal shutdown and wait (bounded) for in-flight jobs to finish
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

        let mut attempts = 0;
        while attempts < MAX_DRAIN_ATTEMPTS {
            let in_flight = self.in_flight();
            if in_flight == 0 {
                break;
            }
            info!(in_flight, "waiting for running jobs to finish");
            tokio::time::sleep(Duration::from_secs(1)).await;
            attempts += 1;
        }

        *is_running = false;
        info!(worker_id = %self.worker_id, "worker service stopped");
    }

    async fn run_loop(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        // ±10% keeps co-started workers from polling in lockstep
        let period = self.poll_interval.mul_f64(0.9 + rand::random::<f64>() * 0.2);
        let mut poll_interval = interval(period);

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    if let Err(err) = self.poll_once().await {
                        error!(worker_id = %self.worker_id, error = %err, "job poll failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!(worker_id = %self.worker_id, "worker loop received shutdown signal");
                    break;
                }
            }
        }
    }

    /// Claim envelopes until the queue is empty or every slot is taken
    async fn poll_once(&self) -> SyncResult<()> {
        loop {
            let Ok(slot) = Arc::clone(&self.slots).try_acquire_owned() else {
                debug!(worker_id = %self.worker_id, "all job slots busy");
                return Ok(());
            };

            let Some(delivery) = self.queue.poll().await? else {
                return Ok(());
            };

            info!(
                worker_id = %self.worker_id,
                job_id = delivery.envelope.job_id,
                job_type = %delivery.envelope.job_type,
                "job picked up"
            );

            let service = self.clone();
            tokio::spawn(async move {
                service.run_delivery(delivery).await;
                drop(slot);
            });
        }
    }

    async fn run_delivery(&self, delivery: QueuedDelivery) {
        let job_id = delivery.envelope.job_id;

        match self.executor.execute(job_id).await {
            Ok(()) => {
                if let Err(err) = self.queue.ack(&delivery).await {
                    warn!(job_id, error = %err, "ack failed, envelope may be redelivered");
                }
            }
            Err(err) => {
                // the executor already recorded the failure on the job row
                error!(job_id, error = %err, "job execution failed");
                if let Err(nack_err) = self.queue.nack(&delivery, false).await {
                    warn!(job_id, error = %nack_err, "nack failed");
                }
            }
        }
    }
}

impl Clone for WorkerService {
    fn clone(&self) -> Self {
        Self {
            worker_id: self.worker_id.clone(),
            queue: Arc::clone(&self.queue),
            executor: Arc::clone(&self.executor),
            max_concurrent_jobs: self.max_concurrent_jobs,
            poll_interval: self.poll_interval,
            slots: Arc::clone(&self.slots),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            is_running: Arc::clone(&self.is_running),
        }
    }
}
