use std::sync::Arc;

use sqlx::{Error, Sqlite, Transaction};
use time::OffsetDateTime;

use crate::configs::Storage;
use crate::models::TelemetryRecord;

pub struct TelemetryRecordRepository {
    storage: Arc<Storage>,
}

impl TelemetryRecordRepository {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl TelemetryRecordRepository {
    pub async fn create(
        &self,
        item: &TelemetryRecord,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<i32, Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO telemetry_records (
                device_id, temperature, humidity, pressure, gas_resistance, captured_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.device_id)
        .bind(item.temperature)
        .bind(item.humidity)
        .bind(item.pressure)
        .bind(item.gas_resistance)
        .bind(item.captured_at)
        .execute(&mut **transaction)
        .await?
        .last_insert_rowid();

        Ok(id as i32)
    }

    /// The single most recent reading at or before `as_of`, however far back
    /// that reaches.
    pub async fn find_latest_at_or_before(
        &self,
        device_id: i32,
        as_of: OffsetDateTime,
    ) -> Result<Option<TelemetryRecord>, Error> {
        let record: Option<TelemetryRecord> = sqlx::query_as(
            r#"
            SELECT * FROM telemetry_records
            WHERE device_id = $1 AND captured_at <= $2
            ORDER BY captured_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .bind(as_of)
        .fetch_optional(self.storage.get_pool())
        .await?;

        Ok(record)
    }

    pub async fn find_by_device_in_range(
        &self,
        device_id: i32,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TelemetryRecord>, Error> {
        let records: Vec<TelemetryRecord> = sqlx::query_as(
            r#"
            SELECT * FROM telemetry_records
            WHERE device_id = $1 AND captured_at >= $2 AND captured_at <= $3
            ORDER BY captured_at
            "#,
        )
        .bind(device_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.storage.get_pool())
        .await?;

        Ok(records)
    }
}
