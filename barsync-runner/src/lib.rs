//! barsync runner: fleet orchestration on top of `barsync-core`.
//!
//! This crate provides:
//! - Fleet configuration loaded from TOML
//! - Symbol list loading (CSV)
//! - Fleet orchestrator: bounded worker pool, jitter, transient-error retries
//! - JSON run reports with a content-hash run id

pub mod config;
pub mod fleet;
pub mod report;
pub mod symbols;

pub use config::{ConfigError, FleetConfig};
pub use fleet::{
    build_tasks, run_fleet, ConsoleProgress, FleetError, FleetReport, SilentProgress,
    SyncProgress, TaskRecord,
};
pub use report::{run_id, write_report, RunReport, TaskSummary};
pub use symbols::load_symbol_list;
