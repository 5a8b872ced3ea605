use std::sync::Arc;

use time::OffsetDateTime;

use crate::configs::Storage;
use crate::errors::ApiError;
use crate::models::{Observation, TelemetryRecord};
use crate::repositories::{ObservationRepository, TelemetryRecordRepository};

/// Last-observation-carried-forward resolution. Every consumer that needs
/// "the state of device X as of time T" goes through here rather than
/// re-deriving its own latest-row query.
///
/// Both lookups are plain reads: calling twice with the same `as_of` gives
/// the same answer no matter what arrived after `as_of`.
pub struct LocfService {
    telemetry: TelemetryRecordRepository,
    observations: ObservationRepository,
}

impl LocfService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            telemetry: TelemetryRecordRepository::new(storage.clone()),
            observations: ObservationRepository::new(storage),
        }
    }

    /// Most recent telemetry at or before `as_of`, however old. `None` only
    /// when the device has never reported — consumers render "no data",
    /// never a fabricated zero.
    pub async fn resolve_telemetry(
        &self,
        device_id: i32,
        as_of: OffsetDateTime,
    ) -> Result<Option<TelemetryRecord>, ApiError> {
        Ok(self
            .telemetry
            .find_latest_at_or_before(device_id, as_of)
            .await?)
    }

    /// Same contract for image-derived scores, restricted to observations
    /// whose transfer finished.
    pub async fn resolve_observation(
        &self,
        device_id: i32,
        as_of: OffsetDateTime,
    ) -> Result<Option<Observation>, ApiError> {
        Ok(self
            .observations
            .find_latest_complete_at_or_before(device_id, as_of)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::configs::{Database, SchemaManager};
    use crate::models::TransferStatus;
    use crate::repositories::{ObservationRepository, TelemetryRecordRepository};

    use super::*;

    async fn setup_test_db() -> Arc<Storage> {
        Arc::new(
            Storage::new(
                Database {
                    migration_path: None,
                    clean_start: true,
                    url: String::from("sqlite::memory:"),
                },
                SchemaManager::default(),
            )
            .await
            .unwrap(),
        )
    }

    async fn create_test_device(storage: &Arc<Storage>, mac: &str) -> i32 {
        let site: (i32,) = sqlx::query_as(
            r#"
            INSERT INTO sites (name, snapshot_cadence_hours, created_at)
                VALUES ($1, 3, $2)
                RETURNING id;
            "#,
        )
        .bind(format!("Site {mac}"))
        .bind(datetime!(2024-06-01 00:00 UTC))
        .fetch_one(storage.get_pool())
        .await
        .unwrap();

        let device: (i32,) = sqlx::query_as(
            r#"
            INSERT INTO devices (site_id, mac_address, name, wake_interval_minutes, active)
                VALUES ($1, $2, 'LOCF test device', 60, TRUE)
                RETURNING id;
            "#,
        )
        .bind(site.0)
        .bind(mac)
        .fetch_one(storage.get_pool())
        .await
        .unwrap();

        device.0
    }

    async fn insert_telemetry(
        storage: &Arc<Storage>,
        device_id: i32,
        temperature: f64,
        captured_at: OffsetDateTime,
    ) {
        let repo = TelemetryRecordRepository::new(storage.clone());
        let mut tx = storage.get_pool().begin().await.unwrap();
        repo.create(
            &TelemetryRecord {
                id: 0,
                device_id,
                temperature,
                humidity: 45.2,
                pressure: Some(1013.25),
                gas_resistance: Some(15.3),
                captured_at,
            },
            &mut tx,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    async fn insert_observation(
        storage: &Arc<Storage>,
        device_id: i32,
        status: TransferStatus,
        score: Option<f64>,
        captured_at: OffsetDateTime,
    ) {
        let repo = ObservationRepository::new(storage.clone());
        let mut tx = storage.get_pool().begin().await.unwrap();
        repo.create(
            &Observation {
                id: 0,
                device_id,
                image_name: "image.jpg".to_string(),
                captured_at,
                transfer_status: status,
                image_size: None,
                total_chunks: None,
                received_chunks: 0,
                score,
                score_velocity: None,
            },
            &mut tx,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_history_resolves_to_none() {
        let storage = setup_test_db().await;
        let device_id = create_test_device(&storage, "AABBCCDD0001").await;

        let service = LocfService::new(storage.clone());
        let telemetry = service
            .resolve_telemetry(device_id, datetime!(2024-06-01 12:00 UTC))
            .await
            .unwrap();
        let observation = service
            .resolve_observation(device_id, datetime!(2024-06-01 12:00 UTC))
            .await
            .unwrap();

        // "No data", never a fabricated zero.
        assert!(telemetry.is_none());
        assert!(observation.is_none());
    }

    #[tokio::test]
    async fn test_reading_carries_forward_across_silent_hours() {
        let storage = setup_test_db().await;
        let device_id = create_test_device(&storage, "AABBCCDD0002").await;

        insert_telemetry(&storage, device_id, 37.4, datetime!(2024-06-01 10:00 UTC)).await;

        let service = LocfService::new(storage.clone());
        let resolved = service
            .resolve_telemetry(device_id, datetime!(2024-06-01 11:00 UTC))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.temperature, 37.4);
        assert_eq!(resolved.captured_at, datetime!(2024-06-01 10:00 UTC));
    }

    #[tokio::test]
    async fn test_resolution_is_monotonic_in_as_of() {
        let storage = setup_test_db().await;
        let device_id = create_test_device(&storage, "AABBCCDD0003").await;

        insert_telemetry(&storage, device_id, 20.0, datetime!(2024-06-01 10:00 UTC)).await;
        insert_telemetry(&storage, device_id, 21.0, datetime!(2024-06-01 11:30 UTC)).await;

        let service = LocfService::new(storage.clone());

        let at_11 = service
            .resolve_telemetry(device_id, datetime!(2024-06-01 11:00 UTC))
            .await
            .unwrap()
            .unwrap();
        let at_12 = service
            .resolve_telemetry(device_id, datetime!(2024-06-01 12:00 UTC))
            .await
            .unwrap()
            .unwrap();

        // Later as_of never yields an older reading, and never one past as_of.
        assert_eq!(at_11.captured_at, datetime!(2024-06-01 10:00 UTC));
        assert_eq!(at_12.captured_at, datetime!(2024-06-01 11:30 UTC));
        assert!(at_12.captured_at >= at_11.captured_at);
    }

    #[tokio::test]
    async fn test_resolution_ignores_later_inserts() {
        let storage = setup_test_db().await;
        let device_id = create_test_device(&storage, "AABBCCDD0004").await;

        insert_telemetry(&storage, device_id, 18.5, datetime!(2024-06-01 09:00 UTC)).await;

        let service = LocfService::new(storage.clone());
        let as_of = datetime!(2024-06-01 10:00 UTC);

        let first = service.resolve_telemetry(device_id, as_of).await.unwrap().unwrap();

        // A reading arriving after as_of must not change the answer.
        insert_telemetry(&storage, device_id, 25.0, datetime!(2024-06-01 10:30 UTC)).await;

        let second = service.resolve_telemetry(device_id, as_of).await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.temperature, 18.5);
    }

    #[tokio::test]
    async fn test_observation_resolution_requires_complete_transfer() {
        let storage = setup_test_db().await;
        let device_id = create_test_device(&storage, "AABBCCDD0005").await;

        insert_observation(
            &storage,
            device_id,
            TransferStatus::Complete,
            Some(12.0),
            datetime!(2024-06-01 08:00 UTC),
        )
        .await;
        // Newer but never finished transferring; must not shadow the
        // complete one.
        insert_observation(
            &storage,
            device_id,
            TransferStatus::Receiving,
            None,
            datetime!(2024-06-01 10:00 UTC),
        )
        .await;

        let service = LocfService::new(storage.clone());
        let resolved = service
            .resolve_observation(device_id, datetime!(2024-06-01 11:00 UTC))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.captured_at, datetime!(2024-06-01 08:00 UTC));
        assert_eq!(resolved.score, Some(12.0));
    }
}
