//! SQLite run journal with WAL mode and migration support.

use crate::agent::{RunOutcome, RunReport};
use crate::state::schema;
use crate::types::{Arguments, ProgressEntry};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info};

/// Summary row of one journaled run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub query: String,
    pub outcome: String,
    pub error_kind: Option<String>,
    pub message: String,
    pub iteration_count: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Write-mostly record of finished runs.
pub struct Journal {
    conn: Connection,
}

impl Journal {
    /// Open (or create) the journal at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite journal")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let mut journal = Self { conn };
        journal.migrate()?;
        Ok(journal)
    }

    /// Open an in-memory journal (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut journal = Self { conn };
        journal.migrate()?;
        Ok(journal)
    }

    fn migrate(&mut self) -> Result<()> {
        let version = self.schema_version();

        if version == 0 {
            info!("Creating journal schema v{}", schema::SCHEMA_VERSION);
            self.conn
                .execute_batch(schema::CREATE_SCHEMA)
                .context("Failed to create schema")?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::SCHEMA_VERSION],
            )?;
        } else if version < schema::SCHEMA_VERSION {
            info!("Migrating journal v1 -> v2");
            self.conn.execute_batch(schema::MIGRATE_V1_TO_V2)?;
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::SCHEMA_VERSION],
            )?;
        }

        Ok(())
    }

    /// Get the current schema version (0 if uninitialized).
    fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Persist a finished run and its progress log in one transaction.
    pub fn record_run(&mut self, report: &RunReport) -> Result<()> {
        let error_kind = match &report.outcome {
            RunOutcome::Failed { error } => Some(error.kind()),
            _ => None,
        };

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO runs (id, query, outcome, error_kind, message, iteration_count, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                report.run_id,
                report.query,
                report.outcome.kind(),
                error_kind,
                report.outcome.message(),
                report.state.iteration_count,
                report.started_at.to_rfc3339(),
                report.finished_at.to_rfc3339(),
            ],
        )?;

        for entry in &report.state.progress {
            let args_json = serde_json::to_string(&entry.arguments)?;
            tx.execute(
                "INSERT INTO progress_entries (run_id, iteration_index, tool_name, arguments_json, result_summary, success, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    report.run_id,
                    entry.iteration_index,
                    entry.tool_name,
                    args_json,
                    entry.result_summary,
                    entry.success as i32,
                    entry.recorded_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;

        debug!(
            "Journaled run {} ({} entries)",
            report.run_id,
            report.state.progress.len()
        );
        Ok(())
    }

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, query, outcome, error_kind, message, iteration_count, started_at, finished_at
             FROM runs ORDER BY started_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RunRecord {
                id: row.get(0)?,
                query: row.get(1)?,
                outcome: row.get(2)?,
                error_kind: row.get(3)?,
                message: row.get(4)?,
                iteration_count: row.get(5)?,
                started_at: row.get::<_, String>(6).map(|s| parse_timestamp(&s))?,
                finished_at: row.get::<_, String>(7).map(|s| parse_timestamp(&s))?,
            })
        })?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?);
        }
        Ok(runs)
    }

    /// Progress log of one run, in iteration order.
    pub fn progress_for(&self, run_id: &str) -> Result<Vec<ProgressEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT iteration_index, tool_name, arguments_json, result_summary, success, recorded_at
             FROM progress_entries WHERE run_id = ?1 ORDER BY iteration_index",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            let args_json: String = row.get(2)?;
            Ok(ProgressEntry {
                iteration_index: row.get(0)?,
                tool_name: row.get(1)?,
                arguments: serde_json::from_str::<Arguments>(&args_json).unwrap_or_default(),
                result_summary: row.get(3)?,
                success: row.get::<_, i32>(4)? != 0,
                recorded_at: row.get::<_, String>(5).map(|s| parse_timestamp(&s))?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
