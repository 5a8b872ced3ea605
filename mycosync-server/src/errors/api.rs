use super::{DeviceError, SessionError, SiteError, SnapshotError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Site error: {0}")]
    SiteError(#[from] SiteError),

    #[error("Device error: {0}")]
    DeviceError(#[from] DeviceError),

    #[error("Session error: {0}")]
    SessionError(#[from] SessionError),

    #[error("Snapshot error: {0}")]
    SnapshotError(#[from] SnapshotError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}
