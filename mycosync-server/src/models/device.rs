use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::Table;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: i32,
    /// Current site assignment. Must agree with the open row in
    /// `device_assignments` at all times.
    pub site_id: Option<i32>,
    pub program_id: Option<i32>,
    /// Canonical form: uppercase hex, no separators.
    pub mac_address: String,
    pub name: String,
    /// Opaque cron-like schedule string owned by the registry.
    pub wake_schedule: Option<String>,
    /// Materialized wake cadence used for expected-wake math.
    pub wake_interval_minutes: i32,
    pub active: bool,
    pub position: Value,
    pub last_wake_at: Option<OffsetDateTime>,
    pub next_wake_at: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct DeviceTable;

impl Table for DeviceTable {
    fn name(&self) -> &'static str {
        "devices"
    }

    fn create(&self) -> String {
        String::from(
            r#"
            CREATE TABLE IF NOT EXISTS devices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER,
                program_id INTEGER,
                mac_address VARCHAR(12) NOT NULL UNIQUE,
                name VARCHAR(255) NOT NULL,
                wake_schedule TEXT,
                wake_interval_minutes INTEGER NOT NULL,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                position JSON NOT NULL DEFAULT 'null',
                last_wake_at TIMESTAMP,
                next_wake_at TIMESTAMP,
                FOREIGN KEY (site_id) REFERENCES sites (id)
            );
            "#,
        )
    }

    fn dispose(&self) -> String {
        String::from("DROP TABLE IF EXISTS devices;")
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["sites"]
    }
}
