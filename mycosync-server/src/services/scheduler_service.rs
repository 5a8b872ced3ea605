use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::broadcast::Sender;

use crate::configs::Storage;
use crate::errors::{ApiError, SnapshotError};
use crate::handles::sse_handle::ServiceEvent;
use crate::models::Snapshot;
use crate::repositories::{SiteRepository, SnapshotRepository};
use crate::services::snapshot_service::SnapshotService;
use crate::services::wake_service::WakeService;

#[derive(Debug)]
pub enum SnapshotDecision {
    Generated(Snapshot),
    Skipped,
}

pub struct SchedulerService {
    storage: Arc<Storage>,
    sites: SiteRepository,
    snapshots: SnapshotRepository,
    snapshot_service: Arc<SnapshotService>,
    wake_service: Arc<WakeService>,
    sender: Sender<ServiceEvent>,
}

impl SchedulerService {
    pub fn new(
        storage: Arc<Storage>,
        snapshot_service: Arc<SnapshotService>,
        wake_service: Arc<WakeService>,
        sender: &Sender<ServiceEvent>,
    ) -> Self {
        Self {
            sites: SiteRepository::new(storage.clone()),
            snapshots: SnapshotRepository::new(storage.clone()),
            storage,
            snapshot_service,
            wake_service,
            sender: sender.clone(),
        }
    }

    /// Generates a snapshot for the site if its cadence has elapsed.
    ///
    /// A null `last_snapshot_at` bootstraps the timeline immediately. The
    /// snapshot insert and the cadence-clock advance share one transaction,
    /// claimed by compare-and-swap on the observed `last_snapshot_at`: a
    /// failed generation never moves the clock, and two concurrent ticks for
    /// the same site cannot both persist a window.
    pub async fn maybe_generate_snapshot(
        &self,
        site_id: i32,
        now: OffsetDateTime,
    ) -> Result<SnapshotDecision, ApiError> {
        let site = self
            .sites
            .find_by_id(site_id)
            .await?
            .ok_or(SnapshotError::SiteNotFound)?;

        let observed = site.last_snapshot_at;
        let due = match observed {
            None => true,
            Some(last) => now - last >= Duration::hours(site.snapshot_cadence_hours as i64),
        };
        if !due {
            return Ok(SnapshotDecision::Skipped);
        }

        let mut tx = self.storage.get_pool().begin().await?;
        let session = self
            .wake_service
            .find_or_create_session(site_id, now.date(), &mut tx)
            .await?;
        tx.commit().await?;

        let window_start = observed.unwrap_or(session.window_start);
        let mut snapshot = self
            .snapshot_service
            .build_snapshot(&session, window_start, now)
            .await?;

        let mut tx = self.storage.get_pool().begin().await?;
        snapshot.window_index = self.snapshots.next_window_index(session.id, &mut tx).await?;
        snapshot.id = self.snapshots.create(&snapshot, &mut tx).await?;

        let claimed = self
            .sites
            .claim_snapshot_window(site_id, observed, now, &mut tx)
            .await?;
        if !claimed {
            tx.rollback().await?;
            tracing::debug!(site_id, "snapshot window already claimed, skipping");
            return Ok(SnapshotDecision::Skipped);
        }
        tx.commit().await?;

        tracing::info!(
            site_id,
            session_id = session.id,
            window_index = snapshot.window_index,
            "generated snapshot"
        );

        let _ = self.sender.send(ServiceEvent::SnapshotCreate(snapshot.clone()));

        Ok(SnapshotDecision::Generated(snapshot))
    }

    /// Recurring tick over every site, independent of device activity —
    /// inactivity is itself state worth recording.
    pub fn spawn(self: &Arc<Self>, tick_interval_seconds: u64) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(tick_interval_seconds));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let now = OffsetDateTime::now_utc();

                let sites = match service.sites.find_all().await {
                    Ok(sites) => sites,
                    Err(e) => {
                        tracing::error!("scheduler site listing failed: {}", e);
                        continue;
                    }
                };

                for site in sites {
                    match service.maybe_generate_snapshot(site.id, now).await {
                        Ok(SnapshotDecision::Generated(_)) => {}
                        Ok(SnapshotDecision::Skipped) => {
                            tracing::debug!(site_id = site.id, "snapshot not due");
                        }
                        // Clock untouched; the next tick retries this window.
                        Err(e) => tracing::error!(site_id = site.id, "snapshot generation failed: {}", e),
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use tokio::sync::broadcast;

    use crate::configs::{Database, SchemaManager};
    use crate::models::Site;
    use crate::services::locf_service::LocfService;

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

    async fn create_test_site(
        storage: &Arc<Storage>,
        cadence_hours: i32,
        last_snapshot_at: Option<OffsetDateTime>,
    ) -> Site {
        sqlx::query_as::<_, Site>(
            r#"
            INSERT INTO sites (name, snapshot_cadence_hours, last_snapshot_at, created_at)
                VALUES ($1, $2, $3, $4)
                RETURNING *;
            "#,
        )
        .bind(format!("Scheduler Site {cadence_hours}"))
        .bind(cadence_hours)
        .bind(last_snapshot_at)
        .bind(datetime!(2024-06-01 00:00 UTC))
        .fetch_one(storage.get_pool())
        .await
        .unwrap()
    }

    fn build_scheduler(storage: &Arc<Storage>) -> SchedulerService {
        let (sender, _receiver) = broadcast::channel(16);
        let locf = Arc::new(LocfService::new(storage.clone()));
        let snapshot_service = Arc::new(SnapshotService::new(storage.clone(), locf));
        let wake_service = Arc::new(WakeService::new(storage.clone(), 30));

        SchedulerService::new(storage.clone(), snapshot_service, wake_service, &sender)
    }

    #[tokio::test]
    async fn test_null_clock_bootstraps_immediately() {
        let storage = setup_test_db().await;
        let site = create_test_site(&storage, 3, None).await;

        let scheduler = build_scheduler(&storage);
        let now = datetime!(2024-06-01 00:30 UTC);
        let decision = scheduler.maybe_generate_snapshot(site.id, now).await.unwrap();

        let snapshot = match decision {
            SnapshotDecision::Generated(snapshot) => snapshot,
            SnapshotDecision::Skipped => panic!("first tick must generate"),
        };
        assert_eq!(snapshot.window_index, 0);

        let site = scheduler.sites.find_by_id(site.id).await.unwrap().unwrap();
        assert_eq!(site.last_snapshot_at, Some(now));
    }

    #[tokio::test]
    async fn test_skips_inside_cadence_without_touching_clock() {
        let storage = setup_test_db().await;
        let last = datetime!(2024-06-01 09:00 UTC);
        let site = create_test_site(&storage, 3, Some(last)).await;

        let scheduler = build_scheduler(&storage);
        let decision = scheduler
            .maybe_generate_snapshot(site.id, datetime!(2024-06-01 10:00 UTC))
            .await
            .unwrap();

        assert!(matches!(decision, SnapshotDecision::Skipped));

        let site = scheduler.sites.find_by_id(site.id).await.unwrap().unwrap();
        assert_eq!(site.last_snapshot_at, Some(last));

        let snapshots = scheduler
            .snapshots
            .find_by_site_in_range(
                site.id,
                datetime!(2024-06-01 00:00 UTC),
                datetime!(2024-06-02 00:00 UTC),
            )
            .await
            .unwrap();
        assert!(snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_generates_once_cadence_elapses() {
        let storage = setup_test_db().await;
        let last = datetime!(2024-06-01 06:00 UTC);
        let site = create_test_site(&storage, 3, Some(last)).await;

        let scheduler = build_scheduler(&storage);
        let now = datetime!(2024-06-01 10:00 UTC);
        let decision = scheduler.maybe_generate_snapshot(site.id, now).await.unwrap();

        let snapshot = match decision {
            SnapshotDecision::Generated(snapshot) => snapshot,
            SnapshotDecision::Skipped => panic!("cadence elapsed, must generate"),
        };
        // The new window continues exactly where the previous one ended.
        assert_eq!(snapshot.window_start, last);
        assert_eq!(snapshot.window_end, now);

        let site = scheduler.sites.find_by_id(site.id).await.unwrap().unwrap();
        assert_eq!(site.last_snapshot_at, Some(now));
    }

    #[tokio::test]
    async fn test_consecutive_ticks_generate_consecutive_windows() {
        let storage = setup_test_db().await;
        let site = create_test_site(&storage, 3, None).await;

        let scheduler = build_scheduler(&storage);
        let first_now = datetime!(2024-06-01 01:00 UTC);
        let second_now = datetime!(2024-06-01 05:00 UTC);

        let first = scheduler.maybe_generate_snapshot(site.id, first_now).await.unwrap();
        let second = scheduler
            .maybe_generate_snapshot(site.id, second_now)
            .await
            .unwrap();

        let (first, second) = match (first, second) {
            (SnapshotDecision::Generated(a), SnapshotDecision::Generated(b)) => (a, b),
            _ => panic!("both ticks were due"),
        };
        assert_eq!(first.window_index, 0);
        assert_eq!(second.window_index, 1);
        assert_eq!(second.window_start, first_now);

        // Same instant again: cadence has not elapsed.
        let third = scheduler
            .maybe_generate_snapshot(site.id, second_now)
            .await
            .unwrap();
        assert!(matches!(third, SnapshotDecision::Skipped));
    }
}
