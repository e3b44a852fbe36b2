//! Fleet orchestrator: runs every (instrument, interval) task on a bounded pool.
//!
//! The pool, the jitter and the progress sink are passed in explicitly. Each
//! task produces a [`TaskRecord`]; nothing is accumulated in shared counters,
//! and one task's failure never cancels another.

use crate::config::FleetConfig;
use barsync_core::data::{archive_dir_name, DataError, SyncEngine, SyncError, SyncReport, SyncTask};
use barsync_core::domain::{Instrument, Interval};
use rand::Rng;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Expand instruments × intervals into tasks.
///
/// Instruments that resolve to the same archive file are dropped after the
/// first, so no two tasks ever write it. The key mirrors the archive path
/// (directory name with its symbol fallback, then symbol) and ignores case,
/// since archive roots may live on case-insensitive filesystems.
pub fn build_tasks(instruments: &[Instrument], intervals: &[Interval]) -> Vec<SyncTask> {
    let mut seen_instruments = HashSet::new();
    let mut unique = Vec::with_capacity(instruments.len());
    for instrument in instruments {
        let key = (
            archive_dir_name(instrument).to_lowercase(),
            instrument.symbol.to_lowercase(),
        );
        if seen_instruments.insert(key) {
            unique.push(instrument);
        } else {
            warn!(symbol = %instrument.symbol, company = %instrument.company_name,
                "duplicate instrument in symbol list, skipping");
        }
    }

    let mut seen_intervals = HashSet::new();
    let intervals: Vec<Interval> = intervals
        .iter()
        .copied()
        .filter(|i| seen_intervals.insert(*i))
        .collect();

    unique
        .into_iter()
        .flat_map(|instrument| {
            intervals
                .iter()
                .map(move |&interval| SyncTask::new(instrument.clone(), interval))
        })
        .collect()
}

/// Progress callbacks. Called from worker threads.
pub trait SyncProgress: Send + Sync {
    fn on_start(&self, task: &SyncTask, total: usize);

    fn on_complete(&self, task: &SyncTask, total: usize, result: &Result<SyncReport, SyncError>);

    fn on_fleet_complete(&self, report: &FleetReport);
}

/// Prints one line per finished task and a final tally.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    done: AtomicUsize,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncProgress for ConsoleProgress {
    fn on_start(&self, _task: &SyncTask, _total: usize) {}

    fn on_complete(&self, task: &SyncTask, total: usize, result: &Result<SyncReport, SyncError>) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        match result {
            Ok(report) if report.reset_corrupt_archive => {
                println!("[{done}/{total}] {task}: {} (corrupt archive replaced)", report.outcome)
            }
            Ok(report) => println!("[{done}/{total}] {task}: {}", report.outcome),
            Err(e) => println!("[{done}/{total}] {task}: FAILED: {e}"),
        }
    }

    fn on_fleet_complete(&self, report: &FleetReport) {
        println!(
            "\nSync complete: {}/{} succeeded, {} failed in {:.1}s",
            report.succeeded,
            report.total,
            report.failed,
            report.elapsed.as_secs_f64()
        );
    }
}

/// Discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl SyncProgress for SilentProgress {
    fn on_start(&self, _task: &SyncTask, _total: usize) {}
    fn on_complete(&self, _task: &SyncTask, _total: usize, _result: &Result<SyncReport, SyncError>) {}
    fn on_fleet_complete(&self, _report: &FleetReport) {}
}

/// Outcome of one task after all attempts.
#[derive(Debug)]
pub struct TaskRecord {
    pub task: SyncTask,
    pub attempts: u32,
    pub result: Result<SyncReport, SyncError>,
}

#[derive(Debug)]
pub struct FleetReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// In task order.
    pub tasks: Vec<TaskRecord>,
    pub elapsed: Duration,
}

impl FleetReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = (&SyncTask, &SyncError)> {
        self.tasks
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (&r.task, e)))
    }
}

/// Run every task on a private pool of `config.max_workers` threads.
pub fn run_fleet(
    engine: &SyncEngine<'_>,
    tasks: &[SyncTask],
    config: &FleetConfig,
    progress: &dyn SyncProgress,
) -> Result<FleetReport, FleetError> {
    let started = Instant::now();
    let total = tasks.len();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_workers.max(1))
        .thread_name(|i| format!("barsync-worker-{i}"))
        .build()?;

    info!(tasks = total, workers = config.max_workers, provider = engine.provider().name(),
        "starting fleet");

    let records: Vec<TaskRecord> = pool.install(|| {
        tasks
            .par_iter()
            .map(|task| {
                progress.on_start(task, total);
                let record = run_task(engine, task, config);
                progress.on_complete(task, total, &record.result);
                record
            })
            .collect()
    });

    let failed = records.iter().filter(|r| r.result.is_err()).count();
    let report = FleetReport {
        total,
        succeeded: total - failed,
        failed,
        tasks: records,
        elapsed: started.elapsed(),
    };
    info!(succeeded = report.succeeded, failed = report.failed, "fleet finished");
    progress.on_fleet_complete(&report);
    Ok(report)
}

fn run_task(engine: &SyncEngine<'_>, task: &SyncTask, config: &FleetConfig) -> TaskRecord {
    sleep_jitter(config);

    let mut attempts = 0;
    loop {
        attempts += 1;
        let result = engine.sync(task);
        match &result {
            Err(e) if e.is_transient() && attempts <= config.retries => {
                let delay = retry_delay(e, config.retry_base_delay_ms, attempts);
                warn!(%task, attempt = attempts, delay_ms = delay.as_millis() as u64, error = %e,
                    "transient failure, retrying");
                thread::sleep(delay);
            }
            Err(e) => {
                error!(%task, attempts, error = %e, "task failed");
                return TaskRecord { task: task.clone(), attempts, result };
            }
            Ok(report) => {
                debug!(%task, attempts, outcome = %report.outcome, "task finished");
                return TaskRecord { task: task.clone(), attempts, result };
            }
        }
    }
}

/// Desynchronize workers so they do not hit the provider in lockstep.
fn sleep_jitter(config: &FleetConfig) {
    if config.jitter_max_ms == 0 {
        return;
    }
    let lo = config.jitter_min_ms.min(config.jitter_max_ms);
    let ms = rand::thread_rng().gen_range(lo..=config.jitter_max_ms);
    thread::sleep(Duration::from_millis(ms));
}

/// Exponential backoff from `base_ms`, never shorter than a provider's retry-after hint.
fn retry_delay(err: &SyncError, base_ms: u64, attempt: u32) -> Duration {
    let backoff = base_ms.saturating_mul(1u64 << (attempt - 1).min(16));
    let hint = match err {
        SyncError::Provider(DataError::RateLimited { retry_after_secs }) => {
            retry_after_secs.saturating_mul(1_000)
        }
        _ => 0,
    };
    Duration::from_millis(backoff.max(hint))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(symbol: &str, name: &str) -> Instrument {
        Instrument::new(symbol, name)
    }

    #[test]
    fn tasks_are_cartesian_product() {
        let tasks = build_tasks(
            &[inst("TCS", "Tata Consultancy Services"), inst("INFY", "Infosys")],
            &[Interval::Day1, Interval::Minute5],
        );
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0], SyncTask::new(inst("TCS", "Tata Consultancy Services"), Interval::Day1));
        assert_eq!(tasks[3], SyncTask::new(inst("INFY", "Infosys"), Interval::Minute5));
    }

    #[test]
    fn duplicate_instruments_and_intervals_are_dropped() {
        let tasks = build_tasks(
            &[inst("TCS", "Tata"), inst("TCS", "Tata"), inst("TCS", "Tata?")],
            &[Interval::Day1, Interval::Day1],
        );
        // "Tata?" sanitizes to the same directory as "Tata".
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn unusable_name_collides_with_symbol_directory() {
        // "<>" sanitizes to nothing, so its archive falls back to the "XYZ" directory.
        let tasks = build_tasks(&[inst("XYZ", "<>"), inst("XYZ", "XYZ")], &[Interval::Day1]);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].instrument.company_name, "<>");
    }

    #[test]
    fn case_only_differences_are_duplicates() {
        let tasks = build_tasks(
            &[inst("TCS", "Tata"), inst("TCS", "TATA"), inst("tcs", "tata")],
            &[Interval::Day1],
        );
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn same_name_different_symbols_are_kept() {
        let tasks = build_tasks(&[inst("TCS", "Tata"), inst("TTM", "Tata")], &[Interval::Day1]);
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn empty_inputs_give_no_tasks() {
        assert!(build_tasks(&[], &Interval::ALL).is_empty());
        assert!(build_tasks(&[inst("TCS", "Tata")], &[]).is_empty());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let err = SyncError::Provider(DataError::NetworkUnreachable("reset".into()));
        assert_eq!(retry_delay(&err, 100, 1), Duration::from_millis(100));
        assert_eq!(retry_delay(&err, 100, 2), Duration::from_millis(200));
        assert_eq!(retry_delay(&err, 100, 4), Duration::from_millis(800));
    }

    #[test]
    fn backoff_respects_retry_after() {
        let err = SyncError::Provider(DataError::RateLimited { retry_after_secs: 3 });
        assert_eq!(retry_delay(&err, 100, 1), Duration::from_secs(3));
    }

    #[test]
    fn zero_jitter_does_not_sleep() {
        let config = FleetConfig {
            jitter_min_ms: 0,
            jitter_max_ms: 0,
            ..FleetConfig::default()
        };
        let started = Instant::now();
        sleep_jitter(&config);
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
