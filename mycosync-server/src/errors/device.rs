use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device not found")]
    DeviceNotFound,

    #[error("Device hardware address already registered")]
    MacAddressExists,

    #[error("Invalid hardware address")]
    InvalidMacAddress,

    #[error("Device is deactivated")]
    DeviceInactive,

    #[error("Device is not assigned to a site")]
    DeviceUnassigned,

    #[error("Site not found")]
    SiteNotFound,

    #[error("Invalid request parameters")]
    InvalidRequest,

    // Direct reference and ledger disagree. Not runtime-recoverable;
    // requires operator reconciliation.
    #[error("Device assignment drift: device row says site {direct:?}, ledger says site {ledger:?}")]
    AssignmentDrift {
        direct: Option<i32>,
        ledger: Option<i32>,
    },
}

impl DeviceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DeviceError::DeviceNotFound => StatusCode::NOT_FOUND,
            DeviceError::MacAddressExists => StatusCode::CONFLICT,
            DeviceError::InvalidMacAddress => StatusCode::BAD_REQUEST,
            DeviceError::DeviceInactive => StatusCode::CONFLICT,
            DeviceError::DeviceUnassigned => StatusCode::CONFLICT,
            DeviceError::SiteNotFound => StatusCode::NOT_FOUND,
            DeviceError::InvalidRequest => StatusCode::BAD_REQUEST,
            DeviceError::AssignmentDrift { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
