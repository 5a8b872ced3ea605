use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::configs::Storage;
use crate::errors::{ApiError, SessionError, SnapshotError};
use crate::repositories::SnapshotRepository;
use crate::services::SnapshotService;

#[derive(Clone)]
pub struct SnapshotState {
    pub storage: Arc<Storage>,
    pub snapshot_service: Arc<SnapshotService>,
}

#[derive(Debug, Deserialize)]
pub struct TimeRangeQuery {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, ApiError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|_| SessionError::InvalidWindow.into())
}

#[derive(Debug, Deserialize)]
pub struct GenerateSnapshotRequest {
    pub window_start: String,
    pub window_end: String,
}

/// Explicit (re)generation for a session window. Snapshots are immutable;
/// corrections come in as new rows, never edits.
pub async fn generate_session_snapshot(
    Path(session_id): Path<i32>,
    State(state): State<SnapshotState>,
    Json(payload): Json<GenerateSnapshotRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let window_start = parse_timestamp(&payload.window_start)?;
    let window_end = parse_timestamp(&payload.window_end)?;
    if window_start > window_end {
        return Err(SessionError::InvalidWindow.into());
    }

    let snapshot = state
        .snapshot_service
        .generate_snapshot(session_id, window_start, window_end)
        .await?;

    Ok(Json(snapshot))
}

pub async fn get_snapshot(
    Path(snapshot_id): Path<i32>,
    State(state): State<SnapshotState>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = SnapshotRepository::new(state.storage.clone())
        .find_by_id(snapshot_id)
        .await?
        .ok_or(SnapshotError::SnapshotNotFound)?;

    Ok(Json(snapshot))
}

/// Timeline read: self-contained snapshot documents for playback, newest
/// window last. Defaults to the trailing 24 hours.
pub async fn get_snapshots_by_site(
    Path(site_id): Path<i32>,
    Query(range): Query<TimeRangeQuery>,
    State(state): State<SnapshotState>,
) -> Result<impl IntoResponse, ApiError> {
    let end = match &range.end {
        Some(raw) => parse_timestamp(raw)?,
        None => OffsetDateTime::now_utc(),
    };
    let start = match &range.start {
        Some(raw) => parse_timestamp(raw)?,
        None => end - Duration::days(1),
    };
    if start > end {
        return Err(SessionError::InvalidWindow.into());
    }

    let snapshots = SnapshotRepository::new(state.storage.clone())
        .find_by_site_in_range(site_id, start, end)
        .await?;

    Ok(Json(snapshots))
}
