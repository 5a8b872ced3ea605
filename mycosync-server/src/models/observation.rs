use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Receiving,
    Complete,
    Failed,
}

/// A captured visual sample and its derived growth score. Transfer status is
/// independent of the owning wake's status; score and velocity are only
/// meaningful once the transfer is `complete`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Observation {
    pub id: i32,
    pub device_id: i32,
    pub image_name: String,
    pub captured_at: OffsetDateTime,
    pub transfer_status: TransferStatus,
    pub image_size: Option<i64>,
    pub total_chunks: Option<i32>,
    pub received_chunks: i32,
    pub score: Option<f64>,
    /// Rate of score change against the previous complete observation,
    /// in points per hour.
    pub score_velocity: Option<f64>,
}

#[derive(Clone)]
pub struct ObservationTable;

impl Table for ObservationTable {
    fn name(&self) -> &'static str {
        "observations"
    }

    fn create(&self) -> String {
        String::from(
            r#"
            CREATE TABLE IF NOT EXISTS observations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL,
                image_name VARCHAR(255) NOT NULL,
                captured_at TIMESTAMP NOT NULL,
                transfer_status TEXT NOT NULL DEFAULT 'pending',
                image_size INTEGER,
                total_chunks INTEGER,
                received_chunks INTEGER NOT NULL DEFAULT 0,
                score REAL,
                score_velocity REAL,
                FOREIGN KEY (device_id) REFERENCES devices (id) ON DELETE CASCADE
            );
            "#,
        )
    }

    fn dispose(&self) -> String {
        String::from("DROP TABLE IF EXISTS observations;")
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["devices"]
    }
}
