//! Journal schema definitions and migrations.

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 2;

/// Full DDL for the run journal.
pub const CREATE_SCHEMA: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

-- One row per finished orchestration run
CREATE TABLE IF NOT EXISTS runs (
    id              TEXT PRIMARY KEY,
    query           TEXT NOT NULL,
    outcome         TEXT NOT NULL,
    error_kind      TEXT,
    message         TEXT NOT NULL DEFAULT '',
    iteration_count INTEGER NOT NULL DEFAULT 0,
    started_at      TEXT NOT NULL,
    finished_at     TEXT NOT NULL
);

-- Progress log entries, in iteration order
CREATE TABLE IF NOT EXISTS progress_entries (
    run_id          TEXT NOT NULL REFERENCES runs(id),
    iteration_index INTEGER NOT NULL,
    tool_name       TEXT NOT NULL,
    arguments_json  TEXT NOT NULL DEFAULT '{}',
    result_summary  TEXT NOT NULL DEFAULT '',
    success         INTEGER NOT NULL DEFAULT 1,
    recorded_at     TEXT NOT NULL,
    PRIMARY KEY (run_id, iteration_index)
);

CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at);
"#;

/// v1 journals predate the `error_kind` column.
pub const MIGRATE_V1_TO_V2: &str = r#"
ALTER TABLE runs ADD COLUMN error_kind TEXT;
CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at);
"#;
