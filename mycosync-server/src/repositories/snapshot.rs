use std::sync::Arc;

use sqlx::{Error, Sqlite, Transaction};
use time::OffsetDateTime;

use crate::configs::Storage;
use crate::models::Snapshot;

pub struct SnapshotRepository {
    storage: Arc<Storage>,
}

impl SnapshotRepository {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl SnapshotRepository {
    pub async fn create(
        &self,
        item: &Snapshot,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<i32, Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO snapshots (
                site_id, session_id, window_index, window_start, window_end,
                device_states, avg_temperature, avg_humidity, avg_score, max_score, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(item.site_id)
        .bind(item.session_id)
        .bind(item.window_index)
        .bind(item.window_start)
        .bind(item.window_end)
        .bind(&item.device_states)
        .bind(item.avg_temperature)
        .bind(item.avg_humidity)
        .bind(item.avg_score)
        .bind(item.max_score)
        .bind(item.created_at)
        .execute(&mut **transaction)
        .await?
        .last_insert_rowid();

        Ok(id as i32)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Snapshot>, Error> {
        let snapshot: Option<Snapshot> = sqlx::query_as("SELECT * FROM snapshots WHERE id = $1")
            .bind(id)
            .fetch_optional(self.storage.get_pool())
            .await?;

        Ok(snapshot)
    }

    pub async fn find_by_site_in_range(
        &self,
        site_id: i32,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Snapshot>, Error> {
        let snapshots: Vec<Snapshot> = sqlx::query_as(
            r#"
            SELECT * FROM snapshots
            WHERE site_id = $1 AND window_end >= $2 AND window_end <= $3
            ORDER BY window_end
            "#,
        )
        .bind(site_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.storage.get_pool())
        .await?;

        Ok(snapshots)
    }

    pub async fn find_by_session_id(&self, session_id: i32) -> Result<Vec<Snapshot>, Error> {
        let snapshots: Vec<Snapshot> =
            sqlx::query_as("SELECT * FROM snapshots WHERE session_id = $1 ORDER BY window_index")
                .bind(session_id)
                .fetch_all(self.storage.get_pool())
                .await?;

        Ok(snapshots)
    }

    pub async fn next_window_index(
        &self,
        session_id: i32,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<i32, Error> {
        let (count,): (i32,) =
            sqlx::query_as("SELECT COUNT(*) FROM snapshots WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&mut **transaction)
                .await?;

        Ok(count)
    }
}
