use std::sync::Arc;

use sqlx::{Error, Sqlite, Transaction};

use crate::configs::Storage;
use crate::models::WakeEvent;

/// From-scratch recount of a session's wake outcomes, used to audit the
/// cached counters on the session row.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct WakeEventCounts {
    pub completed: i32,
    pub failed: i32,
    pub extra: i32,
}

pub struct WakeEventRepository {
    storage: Arc<Storage>,
}

impl WakeEventRepository {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl WakeEventRepository {
    pub async fn create(
        &self,
        item: &WakeEvent,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<i32, Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO wake_events (
                device_id, session_id, window_index, captured_at, status, overage, observation_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.device_id)
        .bind(item.session_id)
        .bind(item.window_index)
        .bind(item.captured_at)
        .bind(item.status)
        .bind(item.overage)
        .bind(item.observation_id)
        .execute(&mut **transaction)
        .await?
        .last_insert_rowid();

        Ok(id as i32)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<WakeEvent>, Error> {
        let event: Option<WakeEvent> = sqlx::query_as("SELECT * FROM wake_events WHERE id = $1")
            .bind(id)
            .fetch_optional(self.storage.get_pool())
            .await?;

        Ok(event)
    }

    pub async fn find_by_session_id(&self, session_id: i32) -> Result<Vec<WakeEvent>, Error> {
        let events: Vec<WakeEvent> = sqlx::query_as(
            "SELECT * FROM wake_events WHERE session_id = $1 ORDER BY captured_at, id",
        )
        .bind(session_id)
        .fetch_all(self.storage.get_pool())
        .await?;

        Ok(events)
    }

    pub async fn next_window_index(
        &self,
        device_id: i32,
        session_id: i32,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<i32, Error> {
        let (count,): (i32,) = sqlx::query_as(
            "SELECT COUNT(*) FROM wake_events WHERE device_id = $1 AND session_id = $2",
        )
        .bind(device_id)
        .bind(session_id)
        .fetch_one(&mut **transaction)
        .await?;

        Ok(count)
    }

    pub async fn recount_by_session_id(&self, session_id: i32) -> Result<WakeEventCounts, Error> {
        let counts: WakeEventCounts = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'complete' AND overage = FALSE THEN 1 ELSE 0 END), 0) AS completed,
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed,
                COALESCE(SUM(CASE WHEN overage = TRUE THEN 1 ELSE 0 END), 0) AS extra
            FROM wake_events
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_one(self.storage.get_pool())
        .await?;

        Ok(counts)
    }
}
