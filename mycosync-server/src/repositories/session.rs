use std::sync::Arc;

use sqlx::{Error, Sqlite, Transaction};
use time::{Date, OffsetDateTime};

use crate::configs::Storage;
use crate::models::{Session, SessionStatus};

pub struct SessionRepository {
    storage: Arc<Storage>,
}

impl SessionRepository {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl SessionRepository {
    pub async fn create(
        &self,
        item: &Session,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<i32, Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO sessions (
                site_id, session_date, window_start, window_end,
                expected_wake_count, completed_wake_count, failed_wake_count,
                extra_wake_count, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.site_id)
        .bind(item.session_date)
        .bind(item.window_start)
        .bind(item.window_end)
        .bind(item.expected_wake_count)
        .bind(item.completed_wake_count)
        .bind(item.failed_wake_count)
        .bind(item.extra_wake_count)
        .bind(item.status)
        .execute(&mut **transaction)
        .await?
        .last_insert_rowid();

        Ok(id as i32)
    }

    /// Insert-if-absent keyed on (site, date); concurrent on-demand creators
    /// race benignly instead of failing on the unique constraint.
    pub async fn create_or_ignore(
        &self,
        item: &Session,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                site_id, session_date, window_start, window_end,
                expected_wake_count, completed_wake_count, failed_wake_count,
                extra_wake_count, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (site_id, session_date) DO NOTHING
            "#,
        )
        .bind(item.site_id)
        .bind(item.session_date)
        .bind(item.window_start)
        .bind(item.window_end)
        .bind(item.expected_wake_count)
        .bind(item.completed_wake_count)
        .bind(item.failed_wake_count)
        .bind(item.extra_wake_count)
        .bind(item.status)
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }

    pub async fn find_by_site_and_date_in_tx(
        &self,
        site_id: i32,
        session_date: Date,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<Option<Session>, Error> {
        let session: Option<Session> =
            sqlx::query_as("SELECT * FROM sessions WHERE site_id = $1 AND session_date = $2")
                .bind(site_id)
                .bind(session_date)
                .fetch_optional(&mut **transaction)
                .await?;

        Ok(session)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Session>, Error> {
        let session: Option<Session> = sqlx::query_as("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.storage.get_pool())
            .await?;

        Ok(session)
    }

    pub async fn find_by_site_and_date(
        &self,
        site_id: i32,
        session_date: Date,
    ) -> Result<Option<Session>, Error> {
        let session: Option<Session> =
            sqlx::query_as("SELECT * FROM sessions WHERE site_id = $1 AND session_date = $2")
                .bind(site_id)
                .bind(session_date)
                .fetch_optional(self.storage.get_pool())
                .await?;

        Ok(session)
    }

    pub async fn find_by_site_in_range(
        &self,
        site_id: i32,
        start: Date,
        end: Date,
    ) -> Result<Vec<Session>, Error> {
        let sessions: Vec<Session> = sqlx::query_as(
            r#"
            SELECT * FROM sessions
            WHERE site_id = $1 AND session_date >= $2 AND session_date <= $3
            ORDER BY session_date
            "#,
        )
        .bind(site_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.storage.get_pool())
        .await?;

        Ok(sessions)
    }

    pub async fn find_open(&self) -> Result<Vec<Session>, Error> {
        let sessions: Vec<Session> =
            sqlx::query_as("SELECT * FROM sessions WHERE status != 'closed' ORDER BY id")
                .fetch_all(self.storage.get_pool())
                .await?;

        Ok(sessions)
    }

    // The three counter bumps below are the only writers of the cached
    // counters. They run inside the wake-insert transaction so the counter
    // and the event commit or roll back together.

    pub async fn increment_completed(
        &self,
        id: i32,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query(
            "UPDATE sessions SET completed_wake_count = completed_wake_count + 1 WHERE id = $1",
        )
        .bind(id)
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }

    pub async fn increment_failed(
        &self,
        id: i32,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE sessions SET failed_wake_count = failed_wake_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&mut **transaction)
            .await?;

        Ok(())
    }

    pub async fn increment_extra(
        &self,
        id: i32,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE sessions SET extra_wake_count = extra_wake_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&mut **transaction)
            .await?;

        Ok(())
    }

    pub async fn mark_in_progress(
        &self,
        id: i32,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE sessions SET status = 'in_progress' WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .execute(&mut **transaction)
            .await?;

        Ok(())
    }

    pub async fn close_elapsed(
        &self,
        now: OffsetDateTime,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<u64, Error> {
        let affected = sqlx::query(
            "UPDATE sessions SET status = 'closed' WHERE window_end <= $1 AND status != 'closed'",
        )
        .bind(now)
        .execute(&mut **transaction)
        .await?
        .rows_affected();

        Ok(affected)
    }

    pub async fn update_status(
        &self,
        id: i32,
        status: SessionStatus,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE sessions SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&mut **transaction)
            .await?;

        Ok(())
    }
}
