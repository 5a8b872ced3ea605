use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

use crate::configs::Storage;
use crate::errors::{ApiError, DeviceError, SessionError, SnapshotError};
use crate::models::{
    Observation, Session, SessionStatus, TelemetryRecord, TransferStatus, WakeEvent, WakeStatus,
};
use crate::repositories::{
    DeviceRepository, ObservationRepository, SessionRepository, TelemetryRecordRepository,
    WakeEventRepository,
};
use crate::services::device_service::normalize_mac;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Wake report as deposited by the ingest collaborator. Field aliases match
/// the device metadata message on the wire; the sensor block rides along
/// inline the way the device sends it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WakeReport {
    #[serde(alias = "device_id")]
    pub mac_address: String,
    #[serde(alias = "capture_timestamp", with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub gas_resistance: Option<f64>,
    #[serde(default)]
    pub image: Option<ImageAnnouncement>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageAnnouncement {
    pub image_name: String,
    #[serde(default)]
    pub image_size: Option<i64>,
    #[serde(default, alias = "total_chunks_count")]
    pub total_chunks: Option<i32>,
}

/// What the ingest collaborator gets back, mirroring the device ACK: the
/// recorded event plus the next scheduled wake.
#[derive(Clone, Debug, Serialize)]
pub struct WakeReceipt {
    pub wake_event: WakeEvent,
    pub observation_id: Option<i32>,
    pub next_wake_at: Option<OffsetDateTime>,
}

pub struct WakeService {
    storage: Arc<Storage>,
    devices: DeviceRepository,
    sessions: SessionRepository,
    wake_events: WakeEventRepository,
    telemetry: TelemetryRecordRepository,
    observations: ObservationRepository,
    /// A wake within this many minutes of `next_wake_at` consumes the
    /// expected window; anything else is overage.
    tolerance_minutes: i64,
}

impl WakeService {
    pub fn new(storage: Arc<Storage>, tolerance_minutes: i64) -> Self {
        Self {
            devices: DeviceRepository::new(storage.clone()),
            sessions: SessionRepository::new(storage.clone()),
            wake_events: WakeEventRepository::new(storage.clone()),
            telemetry: TelemetryRecordRepository::new(storage.clone()),
            observations: ObservationRepository::new(storage.clone()),
            storage,
            tolerance_minutes,
        }
    }

    /// Records a device wake. The event is `complete` the instant it is
    /// written: contact with the server is success, whatever later happens
    /// to an attached image transfer.
    pub async fn record_wake(&self, report: WakeReport) -> Result<WakeReceipt, ApiError> {
        let mac_address = normalize_mac(&report.mac_address)?;

        let device = self
            .devices
            .find_by_mac(&mac_address)
            .await?
            .ok_or(DeviceError::DeviceNotFound)?;

        if !device.active {
            return Err(DeviceError::DeviceInactive.into());
        }
        let site_id = device.site_id.ok_or(DeviceError::DeviceUnassigned)?;

        let captured_at = report.captured_at;
        let overage = match device.next_wake_at {
            Some(next) => (captured_at - next).abs() > Duration::minutes(self.tolerance_minutes),
            // No schedule yet means nothing expected this window.
            None => true,
        };

        let mut tx = self.storage.get_pool().begin().await?;

        let session = self
            .find_or_create_session(site_id, captured_at.date(), &mut tx)
            .await?;

        let observation_id = match &report.image {
            Some(image) => {
                let observation = Observation {
                    id: 0,
                    device_id: device.id,
                    image_name: image.image_name.clone(),
                    captured_at,
                    transfer_status: TransferStatus::Pending,
                    image_size: image.image_size,
                    total_chunks: image.total_chunks,
                    received_chunks: 0,
                    score: None,
                    score_velocity: None,
                };
                Some(self.observations.create(&observation, &mut tx).await?)
            }
            None => None,
        };

        let window_index = self
            .wake_events
            .next_window_index(device.id, session.id, &mut tx)
            .await?;

        let mut event = WakeEvent {
            id: 0,
            device_id: device.id,
            session_id: session.id,
            window_index,
            captured_at,
            status: WakeStatus::Complete,
            overage,
            observation_id,
        };
        event.id = self.wake_events.create(&event, &mut tx).await?;

        // Exactly one counter per event. Overage wakes never count toward
        // completed, so expected vs completed stays comparable.
        if overage {
            self.sessions.increment_extra(session.id, &mut tx).await?;
        } else {
            self.sessions
                .increment_completed(session.id, &mut tx)
                .await?;
        }
        self.sessions.mark_in_progress(session.id, &mut tx).await?;

        if let (Some(temperature), Some(humidity)) = (report.temperature, report.humidity) {
            self.telemetry
                .create(
                    &TelemetryRecord {
                        id: 0,
                        device_id: device.id,
                        temperature,
                        humidity,
                        pressure: report.pressure,
                        gas_resistance: report.gas_resistance,
                        captured_at,
                    },
                    &mut tx,
                )
                .await?;
        }

        let interval = Duration::minutes(device.wake_interval_minutes as i64);
        let next_wake_at = match (overage, device.next_wake_at) {
            // Expected wake consumed: advance the schedule one window.
            (false, Some(next)) => Some(next + interval),
            // First contact of an unscheduled device bootstraps its schedule.
            (true, None) => Some(captured_at + interval),
            (_, next) => next,
        };
        self.devices
            .update_wake_times(device.id, Some(captured_at), next_wake_at, &mut tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            device_id = device.id,
            session_id = session.id,
            overage,
            "recorded wake"
        );

        Ok(WakeReceipt {
            wake_event: event,
            observation_id,
            next_wake_at,
        })
    }

    /// Sweeps expected wake windows that elapsed without contact, marking
    /// each as a terminal failed event. Stale in-flight image transfers are
    /// soft-marked failed, never deleted. Returns the number of windows
    /// failed.
    pub async fn timeout_stale_wakes(
        &self,
        threshold_minutes: i64,
        now: OffsetDateTime,
    ) -> Result<u64, ApiError> {
        let cutoff = now - Duration::minutes(threshold_minutes);
        let overdue = self.devices.find_overdue(cutoff).await?;
        let mut failed_windows = 0u64;

        for device in overdue {
            if device.wake_interval_minutes <= 0 {
                continue;
            }
            let site_id = match device.site_id {
                Some(site_id) => site_id,
                None => continue,
            };
            let interval = Duration::minutes(device.wake_interval_minutes as i64);

            let mut tx = self.storage.get_pool().begin().await?;
            let mut next = match device.next_wake_at {
                Some(next) => next,
                None => continue,
            };

            while next <= cutoff {
                let session = self
                    .find_or_create_session(site_id, next.date(), &mut tx)
                    .await?;
                let window_index = self
                    .wake_events
                    .next_window_index(device.id, session.id, &mut tx)
                    .await?;

                self.wake_events
                    .create(
                        &WakeEvent {
                            id: 0,
                            device_id: device.id,
                            session_id: session.id,
                            window_index,
                            captured_at: next,
                            status: WakeStatus::Failed,
                            overage: false,
                            observation_id: None,
                        },
                        &mut tx,
                    )
                    .await?;
                self.sessions.increment_failed(session.id, &mut tx).await?;
                self.sessions.mark_in_progress(session.id, &mut tx).await?;

                failed_windows += 1;
                next += interval;
            }

            self.devices
                .update_wake_times(device.id, device.last_wake_at, Some(next), &mut tx)
                .await?;
            tx.commit().await?;

            tracing::info!(device_id = device.id, "swept missed wake windows");
        }

        let mut tx = self.storage.get_pool().begin().await?;
        let stale_transfers = self
            .observations
            .fail_stale_transfers(cutoff, &mut tx)
            .await?;
        tx.commit().await?;

        if stale_transfers > 0 {
            tracing::info!(stale_transfers, "marked stale image transfers failed");
        }

        Ok(failed_windows)
    }

    /// Chunk-count progress from the ingest collaborator. The owning wake's
    /// status is untouched: transfer state is independent of wake state.
    pub async fn update_transfer_progress(
        &self,
        observation_id: i32,
        received_chunks: i32,
    ) -> Result<Observation, ApiError> {
        let observation = self
            .observations
            .find_by_id(observation_id)
            .await?
            .ok_or(SnapshotError::ObservationNotFound)?;

        if !matches!(
            observation.transfer_status,
            TransferStatus::Pending | TransferStatus::Receiving
        ) {
            return Err(SnapshotError::InvalidTransferTransition.into());
        }

        let mut tx = self.storage.get_pool().begin().await?;
        self.observations
            .update_transfer_progress(observation_id, TransferStatus::Receiving, received_chunks, &mut tx)
            .await?;
        tx.commit().await?;

        self.observations
            .find_by_id(observation_id)
            .await?
            .ok_or_else(|| SnapshotError::ObservationNotFound.into())
    }

    /// Finishes a transfer with its derived score. Velocity is the score's
    /// rate of change against the device's previous complete observation,
    /// in points per hour.
    pub async fn complete_transfer(
        &self,
        observation_id: i32,
        score: f64,
    ) -> Result<Observation, ApiError> {
        let observation = self
            .observations
            .find_by_id(observation_id)
            .await?
            .ok_or(SnapshotError::ObservationNotFound)?;

        if !matches!(
            observation.transfer_status,
            TransferStatus::Pending | TransferStatus::Receiving
        ) {
            return Err(SnapshotError::InvalidTransferTransition.into());
        }

        let previous = self
            .observations
            .find_previous_complete(observation.device_id, observation.captured_at)
            .await?;
        let score_velocity = previous.and_then(|prev| {
            let hours = (observation.captured_at - prev.captured_at).as_seconds_f64() / 3600.0;
            let prev_score = prev.score?;
            (hours > 0.0).then(|| (score - prev_score) / hours)
        });

        let mut tx = self.storage.get_pool().begin().await?;
        self.observations
            .complete_transfer(observation_id, score, score_velocity, &mut tx)
            .await?;
        tx.commit().await?;

        self.observations
            .find_by_id(observation_id)
            .await?
            .ok_or_else(|| SnapshotError::ObservationNotFound.into())
    }

    pub async fn fail_transfer(&self, observation_id: i32) -> Result<Observation, ApiError> {
        let observation = self
            .observations
            .find_by_id(observation_id)
            .await?
            .ok_or(SnapshotError::ObservationNotFound)?;

        if !matches!(
            observation.transfer_status,
            TransferStatus::Pending | TransferStatus::Receiving
        ) {
            return Err(SnapshotError::InvalidTransferTransition.into());
        }

        let mut tx = self.storage.get_pool().begin().await?;
        self.observations
            .update_transfer_progress(
                observation_id,
                TransferStatus::Failed,
                observation.received_chunks,
                &mut tx,
            )
            .await?;
        tx.commit().await?;

        self.observations
            .find_by_id(observation_id)
            .await?
            .ok_or_else(|| SnapshotError::ObservationNotFound.into())
    }

    /// On-demand session for (site, day). Expected wake counts are fixed at
    /// creation from the intervals of the devices assigned at that moment.
    pub async fn find_or_create_session(
        &self,
        site_id: i32,
        session_date: Date,
        transaction: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    ) -> Result<Session, ApiError> {
        if let Some(session) = self
            .sessions
            .find_by_site_and_date_in_tx(site_id, session_date, transaction)
            .await?
        {
            return Ok(session);
        }

        let devices = self
            .devices
            .find_active_by_site_id_in_tx(site_id, transaction)
            .await?;
        let expected_wake_count: i64 = devices
            .iter()
            .filter(|d| d.wake_interval_minutes > 0)
            .map(|d| MINUTES_PER_DAY / d.wake_interval_minutes as i64)
            .sum();

        let window_start = session_date.midnight().assume_utc();
        let session = Session {
            id: 0,
            site_id,
            session_date,
            window_start,
            window_end: window_start + Duration::days(1),
            expected_wake_count: expected_wake_count as i32,
            completed_wake_count: 0,
            failed_wake_count: 0,
            extra_wake_count: 0,
            status: SessionStatus::Pending,
        };

        self.sessions.create_or_ignore(&session, transaction).await?;

        self.sessions
            .find_by_site_and_date_in_tx(site_id, session_date, transaction)
            .await?
            .ok_or_else(|| SessionError::SessionNotFound.into())
    }

    /// Recounts a session's wake events and compares against the cached
    /// counters. The cache is the only read path, so any drift is a bug.
    pub async fn verify_counters(&self, session_id: i32) -> Result<(), ApiError> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or(SessionError::SessionNotFound)?;

        let counts = self.wake_events.recount_by_session_id(session_id).await?;

        if counts.completed != session.completed_wake_count
            || counts.failed != session.failed_wake_count
            || counts.extra != session.extra_wake_count
        {
            return Err(SessionError::CounterDrift {
                session_id,
                cached_completed: session.completed_wake_count,
                cached_failed: session.failed_wake_count,
                cached_extra: session.extra_wake_count,
                actual_completed: counts.completed,
                actual_failed: counts.failed,
                actual_extra: counts.extra,
            }
            .into());
        }

        Ok(())
    }

    pub async fn close_elapsed_sessions(&self, now: OffsetDateTime) -> Result<u64, ApiError> {
        let mut tx = self.storage.get_pool().begin().await?;
        let closed = self.sessions.close_elapsed(now, &mut tx).await?;
        tx.commit().await?;

        if closed > 0 {
            tracing::info!(closed, "closed elapsed sessions");
        }

        Ok(closed)
    }

    /// Periodic housekeeping: sweep missed wakes, close day-boundary
    /// sessions, audit counters on whatever is still open.
    pub fn spawn_housekeeping(
        self: &Arc<Self>,
        interval_seconds: u64,
        timeout_minutes: i64,
    ) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_seconds));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let now = OffsetDateTime::now_utc();

                if let Err(e) = service.timeout_stale_wakes(timeout_minutes, now).await {
                    tracing::error!("wake timeout sweep failed: {}", e);
                }
                if let Err(e) = service.close_elapsed_sessions(now).await {
                    tracing::error!("session close failed: {}", e);
                }

                match service.sessions.find_open().await {
                    Ok(open) => {
                        for session in open {
                            if let Err(e) = service.verify_counters(session.id).await {
                                tracing::error!("counter reconciliation: {}", e);
                            }
                        }
                    }
                    Err(e) => tracing::error!("counter reconciliation query failed: {}", e),
                }
            }
        })
    }
}
