use std::sync::Arc;

use sqlx::{Error, Sqlite, Transaction};
use time::OffsetDateTime;

use crate::configs::Storage;
use crate::models::Site;

pub struct SiteRepository {
    storage: Arc<Storage>,
}

impl SiteRepository {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl SiteRepository {
    pub async fn create(
        &self,
        item: &Site,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<i32, Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO sites (name, location, snapshot_cadence_hours, last_snapshot_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&item.name)
        .bind(&item.location)
        .bind(item.snapshot_cadence_hours)
        .bind(item.last_snapshot_at)
        .bind(item.created_at)
        .execute(&mut **transaction)
        .await?
        .last_insert_rowid();

        Ok(id as i32)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Site>, Error> {
        let site: Option<Site> = sqlx::query_as("SELECT * FROM sites WHERE id = $1")
            .bind(id)
            .fetch_optional(self.storage.get_pool())
            .await?;

        Ok(site)
    }

    pub async fn find_all(&self) -> Result<Vec<Site>, Error> {
        let sites: Vec<Site> = sqlx::query_as("SELECT * FROM sites ORDER BY id")
            .fetch_all(self.storage.get_pool())
            .await?;

        Ok(sites)
    }

    /// Compare-and-swap advance of the cadence clock. Returns false when
    /// another generation already moved `last_snapshot_at` past `observed`.
    pub async fn claim_snapshot_window(
        &self,
        site_id: i32,
        observed: Option<OffsetDateTime>,
        new_value: OffsetDateTime,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<bool, Error> {
        let affected = sqlx::query(
            r#"
            UPDATE sites
            SET last_snapshot_at = $1
            WHERE id = $2 AND last_snapshot_at IS $3
            "#,
        )
        .bind(new_value)
        .bind(site_id)
        .bind(observed)
        .execute(&mut **transaction)
        .await?
        .rows_affected();

        Ok(affected == 1)
    }
}
