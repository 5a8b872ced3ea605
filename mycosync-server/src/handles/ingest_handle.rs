use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::errors::ApiError;
use crate::services::wake_service::{WakeReport, WakeService};

/// Write surface for the device-protocol collaborator: it deposits wake
/// reports and drives observation transfer status here. The transport
/// itself (MQTT, chunk reassembly) lives outside this server.
#[derive(Clone)]
pub struct IngestState {
    pub wake_service: Arc<WakeService>,
}

#[derive(Debug, Deserialize)]
pub struct TransferProgressRequest {
    pub received_chunks: i32,
}

#[derive(Debug, Deserialize)]
pub struct CompleteTransferRequest {
    pub score: f64,
}

pub async fn record_wake(
    State(state): State<IngestState>,
    Json(report): Json<WakeReport>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.wake_service.record_wake(report).await?;

    Ok(Json(receipt))
}

pub async fn update_transfer_progress(
    Path(observation_id): Path<i32>,
    State(state): State<IngestState>,
    Json(payload): Json<TransferProgressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let observation = state
        .wake_service
        .update_transfer_progress(observation_id, payload.received_chunks)
        .await?;

    Ok(Json(observation))
}

pub async fn complete_transfer(
    Path(observation_id): Path<i32>,
    State(state): State<IngestState>,
    Json(payload): Json<CompleteTransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let observation = state
        .wake_service
        .complete_transfer(observation_id, payload.score)
        .await?;

    Ok(Json(observation))
}

pub async fn fail_transfer(
    Path(observation_id): Path<i32>,
    State(state): State<IngestState>,
) -> Result<impl IntoResponse, ApiError> {
    let observation = state.wake_service.fail_transfer(observation_id).await?;

    Ok(Json(observation))
}
