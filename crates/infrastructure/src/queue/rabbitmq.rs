use std::sync::Arc;

use async_trait::async_trait;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use roomsync_core::{QueueConfig, SyncError, SyncResult};
use roomsync_domain::ports::{JobEnvelope, JobQueue, QueuedDelivery};

/// RabbitMQ-backed work queue with a single durable job queue
pub struct RabbitJobQueue {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
    queue_name: String,
}

impl RabbitJobQueue {
    pub async fn connect(config: &QueueConfig) -> SyncResult<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| SyncError::Queue(format!("failed to connect to RabbitMQ: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| SyncError::Queue(format!("failed to create channel: {e}")))?;

        info!(queue = %config.job_queue, "connected to RabbitMQ");

        let queue = Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
            queue_name: config.job_queue.clone(),
        };

        queue.declare_queue().await?;

        Ok(queue)
    }

    async fn declare_queue(&self) -> SyncResult<()> {
        let channel = self.channel.lock().await;
        channel
            .queue_declare(
                &self.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                SyncError::Queue(format!("failed to declare queue {}: {e}", self.queue_name))
            })?;

        debug!(queue = %self.queue_name, "queue declared");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    pub async fn close(&self) -> SyncResult<()> {
        self.connection
            .close(200, "shutting down")
            .await
            .map_err(|e| SyncError::Queue(format!("failed to close connection: {e}")))?;

        info!("RabbitMQ connection closed");
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RabbitJobQueue {
    async fn publish(&self, envelope: &JobEnvelope) -> SyncResult<()> {
        let payload = serde_json::to_vec(envelope)
            .map_err(|e| SyncError::Serialization(format!("failed to serialize envelope: {e}")))?;

        let channel = self.channel.lock().await;
        let confirm = channel
            .basic_publish(
                "",
                &self.queue_name,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2), // 2 = persistent
            )
            .await
            .map_err(|e| SyncError::Queue(format!("failed to publish job: {e}")))?;

        confirm
            .await
            .map_err(|e| SyncError::Queue(format!("publish not confirmed: {e}")))?;

        debug!(job_id = envelope.job_id, "job published");
        Ok(())
    }

    async fn poll(&self) -> SyncResult<Option<QueuedDelivery>> {
        let channel = self.channel.lock().await;

        match channel
            .basic_get(&self.queue_name, BasicGetOptions::default())
            .await
        {
            Ok(Some(delivery)) => {
                let envelope: JobEnvelope = serde_json::from_slice(&delivery.data)
                    .map_err(|e| SyncError::Serialization(format!("bad envelope: {e}")))?;

                Ok(Some(QueuedDelivery {
                    envelope,
                    delivery_tag: delivery.delivery_tag,
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                // a not-yet-declared queue reads as empty, not as an error
                let message = e.to_string();
                if message.contains("NOT_FOUND") || message.contains("404") {
                    debug!(queue = %self.queue_name, "queue missing, treating as empty");
                    Ok(None)
                } else {
                    Err(SyncError::Queue(format!("failed to fetch job: {e}")))
                }
            }
        }
    }

    async fn ack(&self, delivery: &QueuedDelivery) -> SyncResult<()> {
        let channel = self.channel.lock().await;
        channel
            .basic_ack(delivery.delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| SyncError::Queue(format!("failed to ack: {e}")))?;
        Ok(())
    }

    async fn nack(&self, delivery: &QueuedDelivery, requeue: bool) -> SyncResult<()> {
        let channel = self.channel.lock().await;
        channel
            .basic_nack(
                delivery.delivery_tag,
                BasicNackOptions {
                    requeue,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| SyncError::Queue(format!("failed to nack: {e}")))?;
        Ok(())
    }

    async fn remove_pending(&self, job_id: i64) -> SyncResult<bool> {
        // RabbitMQ cannot delete one pending message by content; the worker
        // side skips already-canceled jobs instead
        debug!(job_id, "remove_pending is a no-op on RabbitMQ");
        Ok(false)
    }
}
