//! Run report export (JSON).

use crate::fleet::{FleetReport, TaskRecord};
use anyhow::{Context, Result};
use barsync_core::data::{SyncOutcome, SyncTask};
use barsync_core::domain::Interval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Content hash of a run: the task list plus its start time.
pub fn run_id(tasks: &[SyncTask], started_at: DateTime<Utc>) -> String {
    let mut hasher = blake3::Hasher::new();
    // Serializing plain structs and strings cannot fail.
    let tasks_json = serde_json::to_vec(tasks).unwrap_or_default();
    hasher.update(&tasks_json);
    hasher.update(started_at.to_rfc3339().as_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSummary {
    pub symbol: String,
    pub company_name: String,
    pub interval: Interval,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SyncOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub reset_corrupt_archive: bool,
}

impl From<&TaskRecord> for TaskSummary {
    fn from(record: &TaskRecord) -> Self {
        let (outcome, error, reset_corrupt_archive) = match &record.result {
            Ok(report) => (Some(report.outcome), None, report.reset_corrupt_archive),
            Err(e) => (None, Some(e.to_string()), false),
        };
        Self {
            symbol: record.task.instrument.symbol.clone(),
            company_name: record.task.instrument.company_name.clone(),
            interval: record.task.interval,
            attempts: record.attempts,
            outcome,
            error,
            reset_corrupt_archive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub provider: String,
    pub archive_dir: PathBuf,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub tasks: Vec<TaskSummary>,
}

impl RunReport {
    pub fn new(
        fleet: &FleetReport,
        started_at: DateTime<Utc>,
        provider: &str,
        archive_dir: &Path,
    ) -> Self {
        let tasks: Vec<SyncTask> = fleet.tasks.iter().map(|r| r.task.clone()).collect();
        Self {
            run_id: run_id(&tasks, started_at),
            started_at,
            duration_secs: fleet.elapsed.as_secs_f64(),
            provider: provider.to_string(),
            archive_dir: archive_dir.to_path_buf(),
            total: fleet.total,
            succeeded: fleet.succeeded,
            failed: fleet.failed,
            tasks: fleet.tasks.iter().map(TaskSummary::from).collect(),
        }
    }
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run report to {}", path.display()))?;
    Ok(())
}
