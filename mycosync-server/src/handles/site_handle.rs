use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::configs::Storage;
use crate::errors::{ApiError, SiteError};
use crate::models::Site;
use crate::repositories::{DeviceRepository, SiteRepository};

#[derive(Clone)]
pub struct SiteState {
    pub storage: Arc<Storage>,
    pub default_cadence_hours: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    pub name: String,
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default)]
    pub snapshot_cadence_hours: Option<i32>,
}

pub async fn create_site(
    State(state): State<SiteState>,
    Json(payload): Json<CreateSiteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(SiteError::InvalidRequest.into());
    }

    let repo = SiteRepository::new(state.storage.clone());
    let site = Site {
        id: 0,
        name: payload.name,
        location: payload.location.unwrap_or(Value::Null),
        snapshot_cadence_hours: payload
            .snapshot_cadence_hours
            .unwrap_or(state.default_cadence_hours),
        last_snapshot_at: None,
        created_at: OffsetDateTime::now_utc(),
    };

    let mut tx = state.storage.get_pool().begin().await?;
    let id = repo.create(&site, &mut tx).await.map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            ApiError::SiteError(SiteError::SiteNameExists)
        }
        other => ApiError::DatabaseError(other),
    })?;
    tx.commit().await?;

    let site = repo.find_by_id(id).await?.ok_or(SiteError::SiteNotFound)?;

    Ok(Json(site))
}

pub async fn get_sites(State(state): State<SiteState>) -> Result<impl IntoResponse, ApiError> {
    let sites = SiteRepository::new(state.storage.clone()).find_all().await?;

    Ok(Json(sites))
}

pub async fn get_site(
    Path(site_id): Path<i32>,
    State(state): State<SiteState>,
) -> Result<impl IntoResponse, ApiError> {
    let site = SiteRepository::new(state.storage.clone())
        .find_by_id(site_id)
        .await?
        .ok_or(SiteError::SiteNotFound)?;

    Ok(Json(site))
}

pub async fn get_site_devices(
    Path(site_id): Path<i32>,
    State(state): State<SiteState>,
) -> Result<impl IntoResponse, ApiError> {
    if SiteRepository::new(state.storage.clone())
        .find_by_id(site_id)
        .await?
        .is_none()
    {
        return Err(SiteError::SiteNotFound.into());
    }

    let devices = DeviceRepository::new(state.storage.clone())
        .find_by_site_id(site_id)
        .await?;

    Ok(Json(devices))
}
