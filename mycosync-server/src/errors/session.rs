use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found")]
    SessionNotFound,

    #[error("Session is closed")]
    SessionClosed,

    #[error("Invalid session window")]
    InvalidWindow,

    #[error(
        "Session {session_id} counter drift: cached {cached_completed}/{cached_failed}/{cached_extra}, recounted {actual_completed}/{actual_failed}/{actual_extra}"
    )]
    CounterDrift {
        session_id: i32,
        cached_completed: i32,
        cached_failed: i32,
        cached_extra: i32,
        actual_completed: i32,
        actual_failed: i32,
        actual_extra: i32,
    },
}

impl SessionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::SessionNotFound => StatusCode::NOT_FOUND,
            SessionError::SessionClosed => StatusCode::CONFLICT,
            SessionError::InvalidWindow => StatusCode::BAD_REQUEST,
            SessionError::CounterDrift { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
