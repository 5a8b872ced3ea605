use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::configs::{SchemaManager, Settings, Storage};
use crate::handles::*;
use crate::services::{
    DeviceService, LocfService, SchedulerService, SnapshotService, WakeService,
};

pub async fn create_app(settings: &Arc<Settings>) -> Router {
    let (sender, _receiver) = broadcast::channel(100);
    let storage = Arc::new(
        Storage::new(settings.database.clone(), SchemaManager::default())
            .await
            .unwrap(),
    );

    let device_service = Arc::new(DeviceService::new(storage.clone()));
    let wake_service = Arc::new(WakeService::new(
        storage.clone(),
        settings.session.wake_tolerance_minutes,
    ));
    let locf_service = Arc::new(LocfService::new(storage.clone()));
    let snapshot_service = Arc::new(SnapshotService::new(storage.clone(), locf_service.clone()));
    let scheduler_service = Arc::new(SchedulerService::new(
        storage.clone(),
        snapshot_service.clone(),
        wake_service.clone(),
        &sender,
    ));

    wake_service.spawn_housekeeping(
        settings.session.housekeeping_interval_seconds,
        settings.session.wake_timeout_minutes,
    );
    scheduler_service.spawn(settings.snapshot.tick_interval_seconds);

    let sites = Router::new()
        .route("/", get(get_sites).post(create_site))
        .route("/:site_id", get(get_site))
        .route("/:site_id/devices", get(get_site_devices))
        .with_state(SiteState {
            storage: storage.clone(),
            default_cadence_hours: settings.snapshot.default_cadence_hours,
        });

    let devices = Router::new()
        .route("/", post(register_device))
        .route("/:device_id", get(get_device).delete(deactivate_device))
        .route("/:device_id/assign", post(assign_device))
        .route("/:device_id/unassign", post(unassign_device))
        .route("/:device_id/assignments", get(get_device_assignments))
        .route("/:device_id/integrity", get(check_device_integrity))
        .with_state(DeviceRegistryState {
            storage: storage.clone(),
            device_service: device_service.clone(),
        });

    let ingest = Router::new()
        .route("/wakes", post(record_wake))
        .route(
            "/observations/:observation_id/progress",
            post(update_transfer_progress),
        )
        .route(
            "/observations/:observation_id/complete",
            post(complete_transfer),
        )
        .route("/observations/:observation_id/fail", post(fail_transfer))
        .with_state(IngestState {
            wake_service: wake_service.clone(),
        });

    let sessions = Router::new()
        .route("/:session_id", get(get_session))
        .route("/:session_id/wakes", get(get_session_wakes))
        .route("/:session_id/counters", get(check_session_counters))
        .route("/site/:site_id", get(get_sessions_by_site))
        .with_state(SessionState {
            storage: storage.clone(),
            wake_service: wake_service.clone(),
        });

    let snapshots = Router::new()
        .route("/:snapshot_id", get(get_snapshot))
        .route("/site/:site_id", get(get_snapshots_by_site))
        .route("/sessions/:session_id", post(generate_session_snapshot))
        .with_state(SnapshotState {
            storage: storage.clone(),
            snapshot_service: snapshot_service.clone(),
        });

    let sse = Router::new()
        .route("/", get(sse_handler))
        .with_state(SseState {
            sender: sender.clone(),
        });

    Router::new()
        .nest("/sites", sites)
        .nest("/devices", devices)
        .nest("/ingest", ingest)
        .nest("/sessions", sessions)
        .nest("/snapshots", snapshots)
        .nest("/events", sse)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
