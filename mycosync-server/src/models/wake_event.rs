use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum WakeStatus {
    Complete,
    Failed,
}

/// One attempted or realized wake window. Status reflects transmission:
/// `complete` the instant the device made contact, `failed` only via the
/// timeout sweep. Never pending, never reopened.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WakeEvent {
    pub id: i32,
    pub device_id: i32,
    pub session_id: i32,
    pub window_index: i32,
    pub captured_at: OffsetDateTime,
    pub status: WakeStatus,
    pub overage: bool,
    pub observation_id: Option<i32>,
}

#[derive(Clone)]
pub struct WakeEventTable;

impl Table for WakeEventTable {
    fn name(&self) -> &'static str {
        "wake_events"
    }

    fn create(&self) -> String {
        String::from(
            r#"
            CREATE TABLE IF NOT EXISTS wake_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL,
                session_id INTEGER NOT NULL,
                window_index INTEGER NOT NULL,
                captured_at TIMESTAMP NOT NULL,
                status TEXT NOT NULL,
                overage BOOLEAN NOT NULL DEFAULT FALSE,
                observation_id INTEGER,
                FOREIGN KEY (device_id) REFERENCES devices (id) ON DELETE CASCADE,
                FOREIGN KEY (session_id) REFERENCES sessions (id) ON DELETE CASCADE,
                FOREIGN KEY (observation_id) REFERENCES observations (id)
            );
            "#,
        )
    }

    fn dispose(&self) -> String {
        String::from("DROP TABLE IF EXISTS wake_events;")
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["devices", "sessions", "observations"]
    }
}
