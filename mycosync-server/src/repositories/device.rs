use std::sync::Arc;

use sqlx::{Error, Sqlite, Transaction};
use time::OffsetDateTime;

use crate::configs::Storage;
use crate::models::Device;

pub struct DeviceRepository {
    storage: Arc<Storage>,
}

impl DeviceRepository {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl DeviceRepository {
    pub async fn create(
        &self,
        item: &Device,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<i32, Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO devices (
                site_id, program_id, mac_address, name, wake_schedule,
                wake_interval_minutes, active, position, last_wake_at, next_wake_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(item.site_id)
        .bind(item.program_id)
        .bind(&item.mac_address)
        .bind(&item.name)
        .bind(&item.wake_schedule)
        .bind(item.wake_interval_minutes)
        .bind(item.active)
        .bind(&item.position)
        .bind(item.last_wake_at)
        .bind(item.next_wake_at)
        .execute(&mut **transaction)
        .await?
        .last_insert_rowid();

        Ok(id as i32)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Device>, Error> {
        let device: Option<Device> = sqlx::query_as("SELECT * FROM devices WHERE id = $1")
            .bind(id)
            .fetch_optional(self.storage.get_pool())
            .await?;

        Ok(device)
    }

    pub async fn find_by_mac(&self, mac_address: &str) -> Result<Option<Device>, Error> {
        let device: Option<Device> = sqlx::query_as("SELECT * FROM devices WHERE mac_address = $1")
            .bind(mac_address)
            .fetch_optional(self.storage.get_pool())
            .await?;

        Ok(device)
    }

    pub async fn find_by_site_id(&self, site_id: i32) -> Result<Vec<Device>, Error> {
        let devices: Vec<Device> =
            sqlx::query_as("SELECT * FROM devices WHERE site_id = $1 ORDER BY id")
                .bind(site_id)
                .fetch_all(self.storage.get_pool())
                .await?;

        Ok(devices)
    }

    pub async fn find_active_by_site_id(&self, site_id: i32) -> Result<Vec<Device>, Error> {
        let devices: Vec<Device> =
            sqlx::query_as("SELECT * FROM devices WHERE site_id = $1 AND active = TRUE ORDER BY id")
                .bind(site_id)
                .fetch_all(self.storage.get_pool())
                .await?;

        Ok(devices)
    }

    pub async fn find_active_by_site_id_in_tx(
        &self,
        site_id: i32,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<Vec<Device>, Error> {
        let devices: Vec<Device> =
            sqlx::query_as("SELECT * FROM devices WHERE site_id = $1 AND active = TRUE ORDER BY id")
                .bind(site_id)
                .fetch_all(&mut **transaction)
                .await?;

        Ok(devices)
    }

    /// Devices whose scheduled wake elapsed without contact as of `cutoff`.
    pub async fn find_overdue(&self, cutoff: OffsetDateTime) -> Result<Vec<Device>, Error> {
        let devices: Vec<Device> = sqlx::query_as(
            r#"
            SELECT * FROM devices
            WHERE active = TRUE
              AND site_id IS NOT NULL
              AND next_wake_at IS NOT NULL
              AND next_wake_at <= $1
            ORDER BY id
            "#,
        )
        .bind(cutoff)
        .fetch_all(self.storage.get_pool())
        .await?;

        Ok(devices)
    }

    pub async fn update_assignment(
        &self,
        id: i32,
        site_id: Option<i32>,
        program_id: Option<i32>,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE devices
            SET site_id = $1, program_id = $2
            WHERE id = $3
            "#,
        )
        .bind(site_id)
        .bind(program_id)
        .bind(id)
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }

    pub async fn update_wake_times(
        &self,
        id: i32,
        last_wake_at: Option<OffsetDateTime>,
        next_wake_at: Option<OffsetDateTime>,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE devices
            SET last_wake_at = $1, next_wake_at = $2
            WHERE id = $3
            "#,
        )
        .bind(last_wake_at)
        .bind(next_wake_at)
        .bind(id)
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }

    pub async fn set_active(
        &self,
        id: i32,
        active: bool,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE devices SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&mut **transaction)
            .await?;

        Ok(())
    }
}
