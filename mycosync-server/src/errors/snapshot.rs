use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot not found")]
    SnapshotNotFound,

    #[error("Site not found")]
    SiteNotFound,

    #[error("Another snapshot generation claimed this window")]
    GenerationConflict,

    #[error("Invalid observation transfer transition")]
    InvalidTransferTransition,

    #[error("Observation not found")]
    ObservationNotFound,
}

impl SnapshotError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SnapshotError::SnapshotNotFound => StatusCode::NOT_FOUND,
            SnapshotError::SiteNotFound => StatusCode::NOT_FOUND,
            SnapshotError::GenerationConflict => StatusCode::CONFLICT,
            SnapshotError::InvalidTransferTransition => StatusCode::BAD_REQUEST,
            SnapshotError::ObservationNotFound => StatusCode::NOT_FOUND,
        }
    }
}
