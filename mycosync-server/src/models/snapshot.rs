use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::Table;

/// Telemetry carried into a snapshot, tagged with when it was captured so
/// consumers can see how stale a carried-forward reading is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedTelemetry {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: Option<f64>,
    pub gas_resistance: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedObservation {
    pub observation_id: i32,
    pub score: f64,
    pub score_velocity: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
}

/// One device's fully resolved entry in a snapshot. Telemetry and
/// observation are `None` only when no reading exists at all as of the
/// window end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceState {
    pub device_id: i32,
    pub mac_address: String,
    pub position: Value,
    pub telemetry: Option<ResolvedTelemetry>,
    pub observation: Option<ResolvedObservation>,
}

/// Immutable point-in-time site state document. Corrections happen by
/// regeneration, never in-place.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Snapshot {
    pub id: i32,
    pub site_id: i32,
    pub session_id: i32,
    pub window_index: i32,
    pub window_start: OffsetDateTime,
    pub window_end: OffsetDateTime,
    /// Serialized `Vec<DeviceState>`.
    pub device_states: Value,
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_score: Option<f64>,
    pub max_score: Option<f64>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct SnapshotTable;

impl Table for SnapshotTable {
    fn name(&self) -> &'static str {
        "snapshots"
    }

    fn create(&self) -> String {
        String::from(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                session_id INTEGER NOT NULL,
                window_index INTEGER NOT NULL,
                window_start TIMESTAMP NOT NULL,
                window_end TIMESTAMP NOT NULL,
                device_states JSON NOT NULL,
                avg_temperature REAL,
                avg_humidity REAL,
                avg_score REAL,
                max_score REAL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (session_id, window_index),
                FOREIGN KEY (site_id) REFERENCES sites (id) ON DELETE CASCADE,
                FOREIGN KEY (session_id) REFERENCES sessions (id) ON DELETE CASCADE
            );
            "#,
        )
    }

    fn dispose(&self) -> String {
        String::from("DROP TABLE IF EXISTS snapshots;")
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["sites", "sessions"]
    }
}
