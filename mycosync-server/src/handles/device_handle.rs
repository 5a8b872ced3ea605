use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::configs::Storage;
use crate::errors::{ApiError, DeviceError};
use crate::repositories::DeviceRepository;
use crate::services::DeviceService;

#[derive(Clone)]
pub struct DeviceRegistryState {
    pub storage: Arc<Storage>,
    pub device_service: Arc<DeviceService>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    pub mac_address: String,
    pub name: String,
    #[serde(default)]
    pub wake_schedule: Option<String>,
    pub wake_interval_minutes: i32,
    #[serde(default)]
    pub position: Option<Value>,
    #[serde(default)]
    pub site_id: Option<i32>,
    #[serde(default)]
    pub program_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct AssignDeviceRequest {
    pub site_id: i32,
    #[serde(default)]
    pub program_id: Option<i32>,
}

pub async fn register_device(
    State(state): State<DeviceRegistryState>,
    Json(payload): Json<RegisterDeviceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.name.trim().is_empty() || payload.wake_interval_minutes < 0 {
        return Err(DeviceError::InvalidRequest.into());
    }

    let device = state
        .device_service
        .register_device(
            &payload.mac_address,
            &payload.name,
            payload.wake_schedule,
            payload.wake_interval_minutes,
            payload.position.unwrap_or(Value::Null),
            payload.site_id,
            payload.program_id,
            OffsetDateTime::now_utc(),
        )
        .await?;

    Ok(Json(device))
}

pub async fn get_device(
    Path(device_id): Path<i32>,
    State(state): State<DeviceRegistryState>,
) -> Result<impl IntoResponse, ApiError> {
    let device = DeviceRepository::new(state.storage.clone())
        .find_by_id(device_id)
        .await?
        .ok_or(DeviceError::DeviceNotFound)?;

    Ok(Json(device))
}

pub async fn assign_device(
    Path(device_id): Path<i32>,
    State(state): State<DeviceRegistryState>,
    Json(payload): Json<AssignDeviceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let device = state
        .device_service
        .assign_device(
            device_id,
            payload.site_id,
            payload.program_id,
            OffsetDateTime::now_utc(),
        )
        .await?;

    Ok(Json(device))
}

pub async fn unassign_device(
    Path(device_id): Path<i32>,
    State(state): State<DeviceRegistryState>,
) -> Result<impl IntoResponse, ApiError> {
    let device = state
        .device_service
        .unassign_device(device_id, OffsetDateTime::now_utc())
        .await?;

    Ok(Json(device))
}

pub async fn deactivate_device(
    Path(device_id): Path<i32>,
    State(state): State<DeviceRegistryState>,
) -> Result<impl IntoResponse, ApiError> {
    state.device_service.deactivate_device(device_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_device_assignments(
    Path(device_id): Path<i32>,
    State(state): State<DeviceRegistryState>,
) -> Result<impl IntoResponse, ApiError> {
    let assignments = state.device_service.assignment_history(device_id).await?;

    Ok(Json(assignments))
}

/// Surfaces assignment drift between the device row and its ledger. Healthy
/// devices return 204; drift is a data-integrity fault and maps to 500.
pub async fn check_device_integrity(
    Path(device_id): Path<i32>,
    State(state): State<DeviceRegistryState>,
) -> Result<impl IntoResponse, ApiError> {
    state.device_service.verify_assignment(device_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
