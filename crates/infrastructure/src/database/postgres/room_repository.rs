use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use roomsync_core::SyncResult;
use roomsync_domain::entities::{Room, RoomDraft, UpsertOutcome};
use roomsync_domain::repositories::RoomRepository;

const ROOM_COLUMNS: &str = "id, external_id, name, description, active, \
     last_synced_message_id, last_sync_at, last_error_at, last_error_message, \
     last_error_status, created_at, updated_at";

pub struct PostgresRoomRepository {
    pool: PgPool,
}

impl PostgresRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_room(row: &sqlx::postgres::PgRow) -> SyncResult<Room> {
        Ok(Room {
            id: row.try_get("id")?,
            external_id: row.try_get("external_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            active: row.try_get("active")?,
            last_synced_message_id: row.try_get("last_synced_message_id")?,
            last_sync_at: row.try_get("last_sync_at")?,
            last_error_at: row.try_get("last_error_at")?,
            last_error_message: row.try_get("last_error_message")?,
            last_error_status: row.try_get("last_error_status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl RoomRepository for PostgresRoomRepository {
    #[instrument(skip(self, draft), fields(external_id = %draft.external_id))]
    async fn upsert(&self, draft: &RoomDraft) -> SyncResult<UpsertOutcome> {
        // xmax = 0 holds only for a freshly inserted row, which lets the
        // statement itself report which branch ran
        let row = sqlx::query(
            "INSERT INTO rooms (external_id, name, description, active) \
             VALUES ($1, $2, $3, TRUE) \
             ON CONFLICT (external_id) DO UPDATE \
             SET name = EXCLUDED.name, description = EXCLUDED.description, \
                 updated_at = $4 \
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(&draft.external_id)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let inserted: bool = row.try_get("inserted")?;
        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn find_by_external_id(&self, external_id: &str) -> SyncResult<Option<Room>> {
        let row = sqlx::query(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_room).transpose()
    }

    async fn list_active(&self, limit: Option<usize>) -> SyncResult<Vec<Room>> {
        // oldest-synced-first so a capped run prefers the stalest rooms
        let rows = sqlx::query(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE active \
             ORDER BY last_sync_at ASC NULLS FIRST, id ASC LIMIT $1"
        ))
        .bind(limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_room).collect()
    }

    async fn list_for_company(&self, company_id: i64) -> SyncResult<Vec<Room>> {
        let rows = sqlx::query(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms \
             WHERE id IN (SELECT room_id FROM room_company_links WHERE company_id = $1) \
             ORDER BY id ASC"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_room).collect()
    }

    async fn linked_company_ids(&self, room_id: i64) -> SyncResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT company_id FROM room_company_links WHERE room_id = $1 \
             ORDER BY company_id ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("company_id").map_err(Into::into))
            .collect()
    }

    #[instrument(skip(self, watermark, at))]
    async fn record_sync_success(
        &self,
        room_id: i64,
        watermark: Option<&str>,
        at: DateTime<Utc>,
    ) -> SyncResult<()> {
        // COALESCE keeps the stored watermark when this run saw nothing newer
        sqlx::query(
            "UPDATE rooms \
             SET last_sync_at = $2, \
                 last_synced_message_id = COALESCE($3, last_synced_message_id), \
                 last_error_at = NULL, last_error_message = NULL, \
                 last_error_status = NULL, updated_at = $2 \
             WHERE id = $1",
        )
        .bind(room_id)
        .bind(at)
        .bind(watermark)
        .execute(&self.pool)
        .await?;

        debug!(room_id, watermark = ?watermark, "room sync recorded");
        Ok(())
    }

    #[instrument(skip(self, message, at))]
    async fn record_sync_error(
        &self,
        room_id: i64,
        message: &str,
        status: Option<u16>,
        at: DateTime<Utc>,
    ) -> SyncResult<()> {
        sqlx::query(
            "UPDATE rooms \
             SET last_error_at = $2, last_error_message = $3, \
                 last_error_status = $4, updated_at = $2 \
             WHERE id = $1",
        )
        .bind(room_id)
        .bind(at)
        .bind(message)
        .bind(status.map(i32::from))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
