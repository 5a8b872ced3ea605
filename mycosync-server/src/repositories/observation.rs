use std::sync::Arc;

use sqlx::{Error, Sqlite, Transaction};
use time::OffsetDateTime;

use crate::configs::Storage;
use crate::models::{Observation, TransferStatus};

pub struct ObservationRepository {
    storage: Arc<Storage>,
}

impl ObservationRepository {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl ObservationRepository {
    pub async fn create(
        &self,
        item: &Observation,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<i32, Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO observations (
                device_id, image_name, captured_at, transfer_status,
                image_size, total_chunks, received_chunks, score, score_velocity
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.device_id)
        .bind(&item.image_name)
        .bind(item.captured_at)
        .bind(item.transfer_status)
        .bind(item.image_size)
        .bind(item.total_chunks)
        .bind(item.received_chunks)
        .bind(item.score)
        .bind(item.score_velocity)
        .execute(&mut **transaction)
        .await?
        .last_insert_rowid();

        Ok(id as i32)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Observation>, Error> {
        let observation: Option<Observation> =
            sqlx::query_as("SELECT * FROM observations WHERE id = $1")
                .bind(id)
                .fetch_optional(self.storage.get_pool())
                .await?;

        Ok(observation)
    }

    pub async fn update_transfer_progress(
        &self,
        id: i32,
        status: TransferStatus,
        received_chunks: i32,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE observations
            SET transfer_status = $1, received_chunks = $2
            WHERE id = $3
            "#,
        )
        .bind(status)
        .bind(received_chunks)
        .bind(id)
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }

    pub async fn complete_transfer(
        &self,
        id: i32,
        score: f64,
        score_velocity: Option<f64>,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE observations
            SET transfer_status = 'complete',
                received_chunks = COALESCE(total_chunks, received_chunks),
                score = $1,
                score_velocity = $2
            WHERE id = $3
            "#,
        )
        .bind(score)
        .bind(score_velocity)
        .bind(id)
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }

    /// Most recent fully transferred observation at or before `as_of`.
    /// Incomplete transfers never resolve.
    pub async fn find_latest_complete_at_or_before(
        &self,
        device_id: i32,
        as_of: OffsetDateTime,
    ) -> Result<Option<Observation>, Error> {
        let observation: Option<Observation> = sqlx::query_as(
            r#"
            SELECT * FROM observations
            WHERE device_id = $1 AND transfer_status = 'complete' AND captured_at <= $2
            ORDER BY captured_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .bind(as_of)
        .fetch_optional(self.storage.get_pool())
        .await?;

        Ok(observation)
    }

    /// The complete observation immediately before `captured_at`, used to
    /// derive score velocity.
    pub async fn find_previous_complete(
        &self,
        device_id: i32,
        captured_at: OffsetDateTime,
    ) -> Result<Option<Observation>, Error> {
        let observation: Option<Observation> = sqlx::query_as(
            r#"
            SELECT * FROM observations
            WHERE device_id = $1 AND transfer_status = 'complete' AND captured_at < $2
            ORDER BY captured_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .bind(captured_at)
        .fetch_optional(self.storage.get_pool())
        .await?;

        Ok(observation)
    }

    /// Soft-marks stale in-flight transfers as failed. Rows are kept; image
    /// data is never deleted here.
    pub async fn fail_stale_transfers(
        &self,
        cutoff: OffsetDateTime,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<u64, Error> {
        let affected = sqlx::query(
            r#"
            UPDATE observations
            SET transfer_status = 'failed'
            WHERE transfer_status IN ('pending', 'receiving') AND captured_at <= $1
            "#,
        )
        .bind(cutoff)
        .execute(&mut **transaction)
        .await?
        .rows_affected();

        Ok(affected)
    }
}
