use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::configs::Storage;
use crate::errors::{ApiError, SessionError};
use crate::repositories::{SessionRepository, WakeEventRepository};
use crate::services::WakeService;

const DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

#[derive(Clone)]
pub struct SessionState {
    pub storage: Arc<Storage>,
    pub wake_service: Arc<WakeService>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

fn parse_date(raw: &str) -> Result<Date, ApiError> {
    Date::parse(raw, DATE_FORMAT).map_err(|_| SessionError::InvalidWindow.into())
}

pub async fn get_session(
    Path(session_id): Path<i32>,
    State(state): State<SessionState>,
) -> Result<impl IntoResponse, ApiError> {
    let session = SessionRepository::new(state.storage.clone())
        .find_by_id(session_id)
        .await?
        .ok_or(SessionError::SessionNotFound)?;

    Ok(Json(session))
}

pub async fn get_session_wakes(
    Path(session_id): Path<i32>,
    State(state): State<SessionState>,
) -> Result<impl IntoResponse, ApiError> {
    if SessionRepository::new(state.storage.clone())
        .find_by_id(session_id)
        .await?
        .is_none()
    {
        return Err(SessionError::SessionNotFound.into());
    }

    let events = WakeEventRepository::new(state.storage.clone())
        .find_by_session_id(session_id)
        .await?;

    Ok(Json(events))
}

pub async fn get_sessions_by_site(
    Path(site_id): Path<i32>,
    Query(range): Query<DateRangeQuery>,
    State(state): State<SessionState>,
) -> Result<impl IntoResponse, ApiError> {
    let today = OffsetDateTime::now_utc().date();
    let end = match &range.end {
        Some(raw) => parse_date(raw)?,
        None => today,
    };
    let start = match &range.start {
        Some(raw) => parse_date(raw)?,
        None => end - time::Duration::days(7),
    };
    if start > end {
        return Err(SessionError::InvalidWindow.into());
    }

    let sessions = SessionRepository::new(state.storage.clone())
        .find_by_site_in_range(site_id, start, end)
        .await?;

    Ok(Json(sessions))
}

/// Reconciliation probe: recounts the session's wake events against its
/// cached counters. Drift maps to 500, matching its severity.
pub async fn check_session_counters(
    Path(session_id): Path<i32>,
    State(state): State<SessionState>,
) -> Result<impl IntoResponse, ApiError> {
    state.wake_service.verify_counters(session_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
