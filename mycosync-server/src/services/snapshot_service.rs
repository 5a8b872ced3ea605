use std::sync::Arc;

use time::OffsetDateTime;

use crate::configs::Storage;
use crate::errors::{ApiError, SessionError};
use crate::models::{
    DeviceState, ResolvedObservation, ResolvedTelemetry, Session, Snapshot,
};
use crate::repositories::{DeviceRepository, SessionRepository, SnapshotRepository};
use crate::services::locf_service::LocfService;

pub struct SnapshotService {
    storage: Arc<Storage>,
    devices: DeviceRepository,
    sessions: SessionRepository,
    snapshots: SnapshotRepository,
    locf: Arc<LocfService>,
}

impl SnapshotService {
    pub fn new(storage: Arc<Storage>, locf: Arc<LocfService>) -> Self {
        Self {
            devices: DeviceRepository::new(storage.clone()),
            sessions: SessionRepository::new(storage.clone()),
            snapshots: SnapshotRepository::new(storage.clone()),
            storage,
            locf,
        }
    }

    /// Assembles the resolved site-state document for one window. Read-only;
    /// persisting is the caller's transaction. Devices unassigned since
    /// session creation simply do not appear; devices with no history ever
    /// appear with null telemetry/observation.
    pub async fn build_snapshot(
        &self,
        session: &Session,
        window_start: OffsetDateTime,
        window_end: OffsetDateTime,
    ) -> Result<Snapshot, ApiError> {
        let devices = self.devices.find_active_by_site_id(session.site_id).await?;

        let mut device_states = Vec::with_capacity(devices.len());
        for device in devices {
            let telemetry = self
                .locf
                .resolve_telemetry(device.id, window_end)
                .await?
                .map(|record| ResolvedTelemetry {
                    temperature: record.temperature,
                    humidity: record.humidity,
                    pressure: record.pressure,
                    gas_resistance: record.gas_resistance,
                    captured_at: record.captured_at,
                });

            let observation = self
                .locf
                .resolve_observation(device.id, window_end)
                .await?
                .and_then(|observation| {
                    observation.score.map(|score| ResolvedObservation {
                        observation_id: observation.id,
                        score,
                        score_velocity: observation.score_velocity,
                        captured_at: observation.captured_at,
                    })
                });

            device_states.push(DeviceState {
                device_id: device.id,
                mac_address: device.mac_address,
                position: device.position,
                telemetry,
                observation,
            });
        }

        // Aggregates cover only devices with something to carry forward;
        // an empty site yields null aggregates, not zeros.
        let temperatures: Vec<f64> = device_states
            .iter()
            .filter_map(|s| s.telemetry.as_ref().map(|t| t.temperature))
            .collect();
        let humidities: Vec<f64> = device_states
            .iter()
            .filter_map(|s| s.telemetry.as_ref().map(|t| t.humidity))
            .collect();
        let scores: Vec<f64> = device_states
            .iter()
            .filter_map(|s| s.observation.as_ref().map(|o| o.score))
            .collect();

        Ok(Snapshot {
            id: 0,
            site_id: session.site_id,
            session_id: session.id,
            window_index: 0,
            window_start,
            window_end,
            device_states: serde_json::to_value(&device_states)
                .map_err(|e| ApiError::InternalError(e.into()))?,
            avg_temperature: mean(&temperatures),
            avg_humidity: mean(&humidities),
            avg_score: mean(&scores),
            max_score: scores.iter().copied().fold(None, |max: Option<f64>, s| {
                Some(max.map_or(s, |m| m.max(s)))
            }),
            created_at: OffsetDateTime::now_utc(),
        })
    }

    /// Builds and persists a snapshot for an explicit window in its own
    /// transaction. The scheduler uses `build_snapshot` directly so the
    /// insert can share a transaction with the cadence-clock claim.
    pub async fn generate_snapshot(
        &self,
        session_id: i32,
        window_start: OffsetDateTime,
        window_end: OffsetDateTime,
    ) -> Result<Snapshot, ApiError> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or(SessionError::SessionNotFound)?;

        let mut snapshot = self
            .build_snapshot(&session, window_start, window_end)
            .await?;

        let mut tx = self.storage.get_pool().begin().await?;
        snapshot.window_index = self.snapshots.next_window_index(session.id, &mut tx).await?;
        snapshot.id = self.snapshots.create(&snapshot, &mut tx).await?;
        tx.commit().await?;

        Ok(snapshot)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
