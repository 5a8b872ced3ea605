use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("Site not found")]
    SiteNotFound,

    #[error("Site name already exists")]
    SiteNameExists,

    #[error("Invalid request parameters")]
    InvalidRequest,
}

impl SiteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SiteError::SiteNotFound => StatusCode::NOT_FOUND,
            SiteError::SiteNameExists => StatusCode::CONFLICT,
            SiteError::InvalidRequest => StatusCode::BAD_REQUEST,
        }
    }
}
