use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::Table;

/// One interval in the assignment ledger. The row with `unassigned_at IS
/// NULL` is the device's current assignment.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceAssignment {
    pub id: i32,
    pub device_id: i32,
    pub site_id: i32,
    pub program_id: Option<i32>,
    pub assigned_at: OffsetDateTime,
    pub unassigned_at: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct DeviceAssignmentTable;

impl Table for DeviceAssignmentTable {
    fn name(&self) -> &'static str {
        "device_assignments"
    }

    fn create(&self) -> String {
        String::from(
            r#"
            CREATE TABLE IF NOT EXISTS device_assignments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL,
                site_id INTEGER NOT NULL,
                program_id INTEGER,
                assigned_at TIMESTAMP NOT NULL,
                unassigned_at TIMESTAMP,
                FOREIGN KEY (device_id) REFERENCES devices (id) ON DELETE CASCADE,
                FOREIGN KEY (site_id) REFERENCES sites (id)
            );
            "#,
        )
    }

    fn dispose(&self) -> String {
        String::from("DROP TABLE IF EXISTS device_assignments;")
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["devices", "sites"]
    }
}
