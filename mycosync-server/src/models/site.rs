use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::Table;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Site {
    pub id: i32,
    pub name: String,
    pub location: Value,
    pub snapshot_cadence_hours: i32,
    /// Advanced only after a snapshot generation commits.
    pub last_snapshot_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct SiteTable;

impl Table for SiteTable {
    fn name(&self) -> &'static str {
        "sites"
    }

    fn create(&self) -> String {
        String::from(
            r#"
            CREATE TABLE IF NOT EXISTS sites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL UNIQUE,
                location JSON NOT NULL DEFAULT 'null',
                snapshot_cadence_hours INTEGER NOT NULL,
                last_snapshot_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL
            );
            "#,
        )
    }

    fn dispose(&self) -> String {
        String::from("DROP TABLE IF EXISTS sites;")
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }
}
