use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Closed,
}

/// Per-site-per-day rollup of expected and actual wake activity. The four
/// counters are a write-maintained cache: every wake event insert bumps
/// exactly one of them inside the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: i32,
    pub site_id: i32,
    pub session_date: Date,
    pub window_start: OffsetDateTime,
    pub window_end: OffsetDateTime,
    pub expected_wake_count: i32,
    pub completed_wake_count: i32,
    pub failed_wake_count: i32,
    pub extra_wake_count: i32,
    pub status: SessionStatus,
}

#[derive(Clone)]
pub struct SessionTable;

impl Table for SessionTable {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn create(&self) -> String {
        String::from(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                session_date DATE NOT NULL,
                window_start TIMESTAMP NOT NULL,
                window_end TIMESTAMP NOT NULL,
                expected_wake_count INTEGER NOT NULL DEFAULT 0,
                completed_wake_count INTEGER NOT NULL DEFAULT 0,
                failed_wake_count INTEGER NOT NULL DEFAULT 0,
                extra_wake_count INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                UNIQUE (site_id, session_date),
                FOREIGN KEY (site_id) REFERENCES sites (id) ON DELETE CASCADE
            );
            "#,
        )
    }

    fn dispose(&self) -> String {
        String::from("DROP TABLE IF EXISTS sessions;")
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["sites"]
    }
}
