use std::sync::Arc;

use sqlx::{Error, Sqlite, Transaction};
use time::OffsetDateTime;

use crate::configs::Storage;
use crate::models::DeviceAssignment;

pub struct DeviceAssignmentRepository {
    storage: Arc<Storage>,
}

impl DeviceAssignmentRepository {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl DeviceAssignmentRepository {
    pub async fn create(
        &self,
        item: &DeviceAssignment,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<i32, Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO device_assignments (device_id, site_id, program_id, assigned_at, unassigned_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.device_id)
        .bind(item.site_id)
        .bind(item.program_id)
        .bind(item.assigned_at)
        .bind(item.unassigned_at)
        .execute(&mut **transaction)
        .await?
        .last_insert_rowid();

        Ok(id as i32)
    }

    pub async fn find_open_by_device_id(
        &self,
        device_id: i32,
    ) -> Result<Option<DeviceAssignment>, Error> {
        let assignment: Option<DeviceAssignment> = sqlx::query_as(
            "SELECT * FROM device_assignments WHERE device_id = $1 AND unassigned_at IS NULL",
        )
        .bind(device_id)
        .fetch_optional(self.storage.get_pool())
        .await?;

        Ok(assignment)
    }

    pub async fn find_by_device_id(&self, device_id: i32) -> Result<Vec<DeviceAssignment>, Error> {
        let assignments: Vec<DeviceAssignment> = sqlx::query_as(
            "SELECT * FROM device_assignments WHERE device_id = $1 ORDER BY assigned_at",
        )
        .bind(device_id)
        .fetch_all(self.storage.get_pool())
        .await?;

        Ok(assignments)
    }

    /// Closes the open interval, if any. Returns how many rows were closed.
    pub async fn close_open(
        &self,
        device_id: i32,
        unassigned_at: OffsetDateTime,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<u64, Error> {
        let affected = sqlx::query(
            r#"
            UPDATE device_assignments
            SET unassigned_at = $1
            WHERE device_id = $2 AND unassigned_at IS NULL
            "#,
        )
        .bind(unassigned_at)
        .bind(device_id)
        .execute(&mut **transaction)
        .await?
        .rows_affected();

        Ok(affected)
    }
}
