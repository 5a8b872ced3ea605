use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::Table;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TelemetryRecord {
    pub id: i32,
    pub device_id: i32,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: Option<f64>,
    pub gas_resistance: Option<f64>,
    pub captured_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct TelemetryRecordTable;

impl Table for TelemetryRecordTable {
    fn name(&self) -> &'static str {
        "telemetry_records"
    }

    fn create(&self) -> String {
        String::from(
            r#"
            CREATE TABLE IF NOT EXISTS telemetry_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL,
                temperature REAL NOT NULL,
                humidity REAL NOT NULL,
                pressure REAL,
                gas_resistance REAL,
                captured_at TIMESTAMP NOT NULL,
                FOREIGN KEY (device_id) REFERENCES devices (id) ON DELETE CASCADE
            );
            "#,
        )
    }

    fn dispose(&self) -> String {
        String::from("DROP TABLE IF EXISTS telemetry_records;")
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["devices"]
    }
}
