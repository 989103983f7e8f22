//! Relational schema
//!
//! Six tables, created idempotently when a database is opened:
//!
//! ```text
//! metrics ──< metric_data_points        (ON DELETE CASCADE)
//! segments ──< segment_campaigns >── campaigns   (both sides ON DELETE CASCADE)
//! segments ──< experiments.target_segment_id     (no action: delete is refused)
//! ```
//!
//! Timestamps are fixed-width RFC 3339 UTC text, so `ORDER BY` on them is chronological.

use rusqlite::Connection;

use crate::store::error::StoreResult;

/// DDL for every table and index, safe to run on an existing database
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS metrics (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    name               TEXT NOT NULL,
    description        TEXT,
    value              REAL,
    unit               TEXT,
    category           TEXT,
    status             TEXT NOT NULL DEFAULT 'inactive',
    version            TEXT NOT NULL DEFAULT 'v1.0.0',
    owner              TEXT,
    priority           TEXT,
    calculation_logic  TEXT,
    alert_settings     TEXT,
    data_source        TEXT,
    aggregation_period TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metrics_category ON metrics(category);
CREATE INDEX IF NOT EXISTS idx_metrics_status ON metrics(status);

CREATE TABLE IF NOT EXISTS metric_data_points (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    metric_id  INTEGER NOT NULL REFERENCES metrics(id) ON DELETE CASCADE,
    value      REAL NOT NULL,
    timestamp  TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_data_points_metric_ts
    ON metric_data_points(metric_id, timestamp);

CREATE TABLE IF NOT EXISTS segments (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    name               TEXT NOT NULL,
    description        TEXT,
    owner              TEXT,
    category           TEXT,
    tags               TEXT,
    refresh_period     TEXT,
    query_definition   TEXT,
    customer_count     INTEGER,
    metric1_value      TEXT,
    metric1_label      TEXT,
    metric2_value      TEXT,
    metric2_label      TEXT,
    metric3_value      TEXT,
    metric3_label      TEXT,
    metric4_value      TEXT,
    metric4_label      TEXT,
    last_touch_channel TEXT,
    last_touch_date    TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_segments_category ON segments(category);

CREATE TABLE IF NOT EXISTS campaigns (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    description TEXT,
    status      TEXT NOT NULL DEFAULT 'active',
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS segment_campaigns (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    segment_id  INTEGER NOT NULL REFERENCES segments(id) ON DELETE CASCADE,
    campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_segment_campaigns_segment ON segment_campaigns(segment_id);
CREATE INDEX IF NOT EXISTS idx_segment_campaigns_campaign ON segment_campaigns(campaign_id);

CREATE TABLE IF NOT EXISTS experiments (
    id                        INTEGER PRIMARY KEY AUTOINCREMENT,
    name                      TEXT NOT NULL,
    description               TEXT,
    owner                     TEXT NOT NULL,
    team                      TEXT,
    experiment_type           TEXT NOT NULL DEFAULT 'A/B Test',
    status                    TEXT NOT NULL DEFAULT 'draft',
    objective                 TEXT,
    background                TEXT,
    hypothesis                TEXT NOT NULL,
    expected_impact           TEXT,
    ice_impact                INTEGER,
    ice_confidence            INTEGER,
    ice_ease                  INTEGER,
    primary_metric_ids        TEXT NOT NULL DEFAULT '[]',
    secondary_metric_ids      TEXT NOT NULL DEFAULT '[]',
    guardrail_metric_ids      TEXT NOT NULL DEFAULT '[]',
    start_date                TEXT,
    end_date                  TEXT,
    target_segment_id         INTEGER NOT NULL REFERENCES segments(id),
    variants                  TEXT NOT NULL DEFAULT '[]',
    experiment_unit           TEXT NOT NULL DEFAULT 'User',
    significance_level        REAL NOT NULL DEFAULT 0.05,
    statistical_power         REAL NOT NULL DEFAULT 0.8,
    minimum_detectable_effect REAL,
    sample_size               TEXT,
    conditions                TEXT,
    confounding_factors       TEXT,
    progress                  REAL NOT NULL DEFAULT 0.0,
    days_left                 INTEGER,
    created_at                TEXT NOT NULL,
    updated_at                TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_experiments_status ON experiments(status);
CREATE INDEX IF NOT EXISTS idx_experiments_created ON experiments(created_at);
CREATE INDEX IF NOT EXISTS idx_experiments_segment ON experiments(target_segment_id);
";

/// Names of all tables, in dependency order
pub const TABLES: [&str; 6] = [
    "metrics",
    "metric_data_points",
    "segments",
    "campaigns",
    "segment_campaigns",
    "experiments",
];

/// Create every table and index that does not exist yet
pub fn create_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count == 1)
        .unwrap_or(false)
    }

    #[test]
    fn test_create_schema() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();

        for table in TABLES {
            assert!(table_exists(&conn, table), "missing table {}", table);
        }
    }

    #[test]
    fn test_create_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        create_schema(&conn).unwrap();

        assert!(table_exists(&conn, "experiments"));
    }
}
