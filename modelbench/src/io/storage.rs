//! SQLite persistence for benchmark runs, jobs, metrics, and capability
//! snapshots.
//!
//! The orchestrator treats this purely as a recorder. Prompt text is stored
//! as hash plus a redacted preview; error messages are redacted before they
//! land on disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::core::redaction::redact_for_storage;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    suite_path TEXT,
    status TEXT NOT NULL DEFAULT 'running',
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id),
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    prompt_hash TEXT NOT NULL,
    prompt_preview TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    error_message TEXT,
    exit_code INTEGER
);

CREATE TABLE IF NOT EXISTS metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL REFERENCES jobs(id),
    metric_name TEXT NOT NULL,
    metric_value REAL NOT NULL,
    metric_unit TEXT,
    is_estimated INTEGER DEFAULT 0
);

CREATE TABLE IF NOT EXISTS capabilities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    detected_at TEXT NOT NULL,
    provider TEXT NOT NULL,
    binary_path TEXT NOT NULL,
    binary_version TEXT,
    auth_status TEXT,
    models_json TEXT,
    UNIQUE(provider, binary_path)
);

CREATE INDEX IF NOT EXISTS idx_jobs_run_id ON jobs(run_id);
CREATE INDEX IF NOT EXISTS idx_metrics_job_id ON metrics(job_id);
CREATE INDEX IF NOT EXISTS idx_capabilities_provider ON capabilities(provider);
";

/// SHA-256 hex digest of prompt text.
pub fn hash_prompt(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: String,
    pub created_at: String,
    pub status: String,
    pub suite_path: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub run_id: String,
    pub provider: String,
    pub model: String,
    pub prompt_hash: String,
    pub prompt_preview: Option<String>,
    pub status: String,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub id: i64,
    pub job_id: String,
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub is_estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityRecord {
    pub id: i64,
    pub detected_at: String,
    pub provider: String,
    pub binary_path: String,
    pub binary_version: Option<String>,
    pub auth_status: Option<String>,
    pub models: Vec<String>,
}

pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (and initialize) the database at `path`, creating parent
    /// directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create db dir {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open database {}", path.display()))?;
        conn.execute_batch(SCHEMA).context("initialize schema")?;
        debug!(path = %path.display(), "storage opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        conn.execute_batch(SCHEMA).context("initialize schema")?;
        Ok(Self { conn })
    }

    // Runs

    pub fn create_run(&self, suite_path: Option<&str>) -> Result<Run> {
        let run = Run {
            id: Uuid::new_v4().to_string(),
            created_at: now_iso(),
            status: "running".to_string(),
            suite_path: suite_path.map(str::to_string),
            completed_at: None,
        };
        self.conn
            .execute(
                "INSERT INTO runs (id, created_at, suite_path, status) VALUES (?1, ?2, ?3, ?4)",
                params![run.id, run.created_at, run.suite_path, run.status],
            )
            .context("insert run")?;
        Ok(run)
    }

    pub fn get_run(&self, run_id: &str) -> Result<Option<Run>> {
        self.conn
            .query_row(
                "SELECT id, created_at, status, suite_path, completed_at FROM runs WHERE id = ?1",
                params![run_id],
                |row| {
                    Ok(Run {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                        status: row.get(2)?,
                        suite_path: row.get(3)?,
                        completed_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .context("query run")
    }

    pub fn complete_run(&self, run_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE runs SET status = 'completed', completed_at = ?1 WHERE id = ?2",
                params![now_iso(), run_id],
            )
            .context("complete run")?;
        Ok(())
    }

    pub fn list_runs(&self, limit: usize) -> Result<Vec<Run>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, created_at, status, suite_path, completed_at
                 FROM runs ORDER BY created_at DESC LIMIT ?1",
            )
            .context("prepare list runs")?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(Run {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    status: row.get(2)?,
                    suite_path: row.get(3)?,
                    completed_at: row.get(4)?,
                })
            })
            .context("query runs")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect runs")
    }

    // Jobs

    pub fn create_job(
        &self,
        run_id: &str,
        provider: &str,
        model: &str,
        prompt_hash: &str,
        prompt_preview: Option<&str>,
    ) -> Result<Job> {
        let job = Job {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            prompt_hash: prompt_hash.to_string(),
            prompt_preview: redact_for_storage(prompt_preview),
            status: "pending".to_string(),
            created_at: now_iso(),
            started_at: None,
            completed_at: None,
            error_message: None,
            exit_code: None,
        };
        self.conn
            .execute(
                "INSERT INTO jobs (id, run_id, provider, model, prompt_hash, prompt_preview, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    job.id,
                    job.run_id,
                    job.provider,
                    job.model,
                    job.prompt_hash,
                    job.prompt_preview,
                    job.status,
                    job.created_at
                ],
            )
            .context("insert job")?;
        Ok(job)
    }

    pub fn start_job(&self, job_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE jobs SET status = 'running', started_at = ?1 WHERE id = ?2",
                params![now_iso(), job_id],
            )
            .context("start job")?;
        Ok(())
    }

    pub fn complete_job(
        &self,
        job_id: &str,
        exit_code: i32,
        error_message: Option<&str>,
    ) -> Result<()> {
        let status = if exit_code == 0 { "completed" } else { "failed" };
        self.conn
            .execute(
                "UPDATE jobs SET status = ?1, completed_at = ?2, exit_code = ?3, error_message = ?4
                 WHERE id = ?5",
                params![
                    status,
                    now_iso(),
                    exit_code,
                    redact_for_storage(error_message),
                    job_id
                ],
            )
            .context("complete job")?;
        Ok(())
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
        self.conn
            .query_row(
                "SELECT id, run_id, provider, model, prompt_hash, prompt_preview, status,
                        created_at, started_at, completed_at, error_message, exit_code
                 FROM jobs WHERE id = ?1",
                params![job_id],
                job_from_row,
            )
            .optional()
            .context("query job")
    }

    pub fn jobs_for_run(&self, run_id: &str) -> Result<Vec<Job>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, run_id, provider, model, prompt_hash, prompt_preview, status,
                        created_at, started_at, completed_at, error_message, exit_code
                 FROM jobs WHERE run_id = ?1 ORDER BY created_at",
            )
            .context("prepare jobs query")?;
        let rows = stmt
            .query_map(params![run_id], job_from_row)
            .context("query jobs")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect jobs")
    }

    // Metrics

    pub fn add_metric(
        &self,
        job_id: &str,
        name: &str,
        value: f64,
        unit: Option<&str>,
        is_estimated: bool,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO metrics (job_id, metric_name, metric_value, metric_unit, is_estimated)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![job_id, name, value, unit, i32::from(is_estimated)],
            )
            .context("insert metric")?;
        Ok(())
    }

    pub fn job_metrics(&self, job_id: &str) -> Result<Vec<Metric>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, job_id, metric_name, metric_value, metric_unit, is_estimated
                 FROM metrics WHERE job_id = ?1",
            )
            .context("prepare metrics query")?;
        let rows = stmt
            .query_map(params![job_id], |row| {
                Ok(Metric {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    name: row.get(2)?,
                    value: row.get(3)?,
                    unit: row.get(4)?,
                    is_estimated: row.get::<_, i32>(5)? != 0,
                })
            })
            .context("query metrics")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect metrics")
    }

    // Capability snapshots

    /// Insert or refresh the capability snapshot for (provider, binary).
    pub fn save_capabilities(
        &self,
        provider: &str,
        binary_path: &str,
        binary_version: Option<&str>,
        auth_status: Option<&str>,
        models: &[String],
    ) -> Result<()> {
        let models_json = serde_json::to_string(models).context("serialize models")?;
        self.conn
            .execute(
                "INSERT INTO capabilities
                     (detected_at, provider, binary_path, binary_version, auth_status, models_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(provider, binary_path) DO UPDATE SET
                     detected_at = excluded.detected_at,
                     binary_version = excluded.binary_version,
                     auth_status = excluded.auth_status,
                     models_json = excluded.models_json",
                params![
                    now_iso(),
                    provider,
                    binary_path,
                    binary_version,
                    auth_status,
                    models_json
                ],
            )
            .context("save capabilities")?;
        Ok(())
    }

    pub fn capabilities_for(&self, provider: &str) -> Result<Vec<CapabilityRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, detected_at, provider, binary_path, binary_version, auth_status, models_json
                 FROM capabilities WHERE provider = ?1",
            )
            .context("prepare capabilities query")?;
        let rows = stmt
            .query_map(params![provider], |row| {
                let models_json: Option<String> = row.get(6)?;
                Ok(CapabilityRecord {
                    id: row.get(0)?,
                    detected_at: row.get(1)?,
                    provider: row.get(2)?,
                    binary_path: row.get(3)?,
                    binary_version: row.get(4)?,
                    auth_status: row.get(5)?,
                    models: models_json
                        .and_then(|json| serde_json::from_str(&json).ok())
                        .unwrap_or_default(),
                })
            })
            .context("query capabilities")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect capabilities")
    }
}

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        run_id: row.get(1)?,
        provider: row.get(2)?,
        model: row.get(3)?,
        prompt_hash: row.get(4)?,
        prompt_preview: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
        error_message: row.get(10)?,
        exit_code: row.get(11)?,
    })
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_and_job_lifecycle_round_trips() {
        let storage = Storage::open_in_memory().expect("storage");
        let run = storage.create_run(Some("suite.toml")).expect("run");
        let job = storage
            .create_job(&run.id, "fake", "fake-fast", &hash_prompt("hello"), Some("hello"))
            .expect("job");
        storage.start_job(&job.id).expect("start");
        storage
            .complete_job(&job.id, 0, None)
            .expect("complete job");
        storage.complete_run(&run.id).expect("complete run");

        let stored_run = storage.get_run(&run.id).expect("query").expect("found");
        assert_eq!(stored_run.status, "completed");
        assert!(stored_run.completed_at.is_some());

        let stored_job = storage.get_job(&job.id).expect("query").expect("found");
        assert_eq!(stored_job.status, "completed");
        assert_eq!(stored_job.exit_code, Some(0));
        assert_eq!(stored_job.provider, "fake");
    }

    #[test]
    fn failed_job_records_exit_code_and_redacted_error() {
        let storage = Storage::open_in_memory().expect("storage");
        let run = storage.create_run(None).expect("run");
        let job = storage
            .create_job(&run.id, "openai", "gpt-4o", &hash_prompt("x"), None)
            .expect("job");
        storage
            .complete_job(
                &job.id,
                1,
                Some("invalid key sk-abcdefghijklmnopqrstuvwx"),
            )
            .expect("complete");

        let stored = storage.get_job(&job.id).expect("query").expect("found");
        assert_eq!(stored.status, "failed");
        assert_eq!(stored.exit_code, Some(1));
        let error = stored.error_message.expect("error stored");
        assert!(!error.contains("sk-abcdefghijklmnop"));
        assert!(error.contains("[REDACTED]"));
    }

    #[test]
    fn prompt_preview_is_redacted_on_insert() {
        let storage = Storage::open_in_memory().expect("storage");
        let run = storage.create_run(None).expect("run");
        let job = storage
            .create_job(
                &run.id,
                "fake",
                "m",
                &hash_prompt("secret"),
                Some("use api_key=abcdef0123456789 please"),
            )
            .expect("job");
        let preview = job.prompt_preview.expect("preview");
        assert!(!preview.contains("abcdef0123456789"));
    }

    #[test]
    fn metrics_round_trip_with_estimation_flag() {
        let storage = Storage::open_in_memory().expect("storage");
        let run = storage.create_run(None).expect("run");
        let job = storage
            .create_job(&run.id, "fake", "m", &hash_prompt("x"), None)
            .expect("job");
        storage
            .add_metric(&job.id, "wall_time_ms", 123.0, Some("ms"), false)
            .expect("metric");
        storage
            .add_metric(&job.id, "output_tokens", 42.0, Some("tokens"), true)
            .expect("metric");

        let metrics = storage.job_metrics(&job.id).expect("metrics");
        assert_eq!(metrics.len(), 2);
        let tokens = metrics
            .iter()
            .find(|metric| metric.name == "output_tokens")
            .expect("tokens metric");
        assert!(tokens.is_estimated);
        assert_eq!(tokens.value, 42.0);
    }

    #[test]
    fn capability_snapshot_upserts_on_same_binary() {
        let storage = Storage::open_in_memory().expect("storage");
        storage
            .save_capabilities("ollama", "/usr/bin/ollama", Some("0.1.0"), None, &[])
            .expect("save");
        storage
            .save_capabilities(
                "ollama",
                "/usr/bin/ollama",
                Some("0.2.0"),
                Some("authenticated"),
                &["llama3.2".to_string()],
            )
            .expect("resave");

        let records = storage.capabilities_for("ollama").expect("query");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].binary_version.as_deref(), Some("0.2.0"));
        assert_eq!(records[0].models, vec!["llama3.2"]);
    }

    #[test]
    fn hash_prompt_is_stable_sha256() {
        assert_eq!(hash_prompt("abc").len(), 64);
        assert_eq!(hash_prompt("abc"), hash_prompt("abc"));
        assert_ne!(hash_prompt("abc"), hash_prompt("abd"));
    }

    #[test]
    fn list_runs_orders_newest_first() {
        let storage = Storage::open_in_memory().expect("storage");
        let first = storage.create_run(Some("a")).expect("run");
        let second = storage.create_run(Some("b")).expect("run");
        let runs = storage.list_runs(10).expect("list");
        assert_eq!(runs.len(), 2);
        // Same-timestamp ties are possible; both must be present.
        let ids: Vec<&str> = runs.iter().map(|run| run.id.as_str()).collect();
        assert!(ids.contains(&first.id.as_str()));
        assert!(ids.contains(&second.id.as_str()));
    }
}
