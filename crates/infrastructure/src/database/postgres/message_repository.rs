use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use roomsync_core::SyncResult;
use roomsync_domain::entities::NewMessage;
use roomsync_domain::repositories::MessageRepository;

pub struct PostgresMessageRepository {
    pool: PgPool,
}

impl PostgresMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    #[instrument(skip(self, message), fields(room_id = %message.room_id))]
    async fn insert_if_absent(&self, message: &NewMessage) -> SyncResult<bool> {
        // re-runs over overlapping ranges must not duplicate rows
        let inserted = sqlx::query(
            "INSERT INTO room_messages \
             (room_id, external_id, sender_id, sender_name, body, sent_at, company_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (room_id, external_id) DO NOTHING",
        )
        .bind(message.room_id)
        .bind(&message.external_id)
        .bind(&message.sender_id)
        .bind(&message.sender_name)
        .bind(&message.body)
        .bind(message.sent_at)
        .bind(message.company_id)
        .execute(&self.pool)
        .await?;

        Ok(inserted.rows_affected() == 1)
    }

    async fn count_for_room(&self, room_id: i64) -> SyncResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM room_messages WHERE room_id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;

        row.try_get("count").map_err(Into::into)
    }
}
