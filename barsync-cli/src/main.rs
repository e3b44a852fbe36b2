//! barsync CLI: keep a local archive of equity bars up to date.
//!
//! Commands:
//! - `sync`: bring every (symbol, interval) archive up to date from Yahoo Finance
//! - `status`: list stored archives with row counts and time ranges
//! - `intervals`: show supported intervals and their provider retention limits

use anyhow::{Context, Result};
use barsync_core::data::{
    policy_for, ArchiveHealth, ArchiveStore, ProviderGateway, QueryKind,
    SyncEngine, YahooGateway,
};
use barsync_core::domain::Interval;
use barsync_runner::{
    build_tasks, load_symbol_list, run_fleet, write_report, ConsoleProgress, FleetConfig,
    RunReport,
};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "barsync",
    about = "barsync: incremental equity bar archive sync"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every symbol in the list for every selected interval.
    Sync {
        /// Path to a TOML config file. Flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbol list CSV.
        #[arg(long)]
        source: Option<PathBuf>,

        /// Archive root directory.
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// Number of parallel workers.
        #[arg(long)]
        workers: Option<usize>,

        /// Intervals to sync, comma-separated (e.g. 1d,1wk,5m). Defaults to all.
        #[arg(long, value_delimiter = ',')]
        intervals: Option<Vec<Interval>>,

        /// Market suffix appended to each symbol (e.g. .NS, .BO).
        #[arg(long)]
        suffix: Option<String>,

        /// Extra attempts for rate-limit and network failures.
        #[arg(long)]
        retries: Option<u32>,

        /// Write a JSON run report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List stored archives.
    Status {
        /// Archive root directory.
        #[arg(long, default_value = ".")]
        archive_dir: PathBuf,
    },
    /// Show supported intervals and their retention limits.
    Intervals,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Sync {
            config,
            source,
            archive_dir,
            workers,
            intervals,
            suffix,
            retries,
            report,
        } => {
            let mut fleet_config = match config {
                Some(path) => FleetConfig::from_file(&path)?,
                None => FleetConfig::default(),
            };
            if let Some(source) = source {
                fleet_config.source_file = source;
            }
            if let Some(dir) = archive_dir {
                fleet_config.archive_dir = dir;
            }
            if let Some(workers) = workers {
                fleet_config.max_workers = workers;
            }
            if let Some(intervals) = intervals {
                fleet_config.intervals = intervals;
            }
            if let Some(suffix) = suffix {
                fleet_config.market_suffix = suffix;
            }
            if let Some(retries) = retries {
                fleet_config.retries = retries;
            }
            fleet_config.validate()?;
            run_sync(&fleet_config, report.as_deref())
        }
        Commands::Status { archive_dir } => run_status(&archive_dir),
        Commands::Intervals => {
            run_intervals();
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_sync(config: &FleetConfig, report_path: Option<&Path>) -> Result<()> {
    let instruments =
        load_symbol_list(&config.source_file, &config.symbol_column, &config.name_column)?;
    let tasks = build_tasks(&instruments, &config.intervals);
    println!(
        "Found {} symbols. Syncing {} tasks with {} workers...",
        instruments.len(),
        tasks.len(),
        config.max_workers
    );

    let store = ArchiveStore::new(&config.archive_dir);
    let provider = YahooGateway::new()?;
    let engine = SyncEngine::new(&store, &provider, config.market_suffix.as_str());

    let started_at = Utc::now();
    let progress = ConsoleProgress::new();
    let fleet = run_fleet(&engine, &tasks, config, &progress)?;

    if let Some(path) = report_path {
        let report = RunReport::new(&fleet, started_at, provider.name(), &config.archive_dir);
        write_report(path, &report)?;
        info!(run_id = %report.run_id, path = %path.display(), "run report written");
        println!("Run report saved to: {}", path.display());
    }

    if !fleet.all_succeeded() {
        for (task, err) in fleet.failures() {
            eprintln!("Error for {task}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_status(archive_dir: &Path) -> Result<()> {
    if !archive_dir.exists() {
        println!("Archive directory does not exist: {}", archive_dir.display());
        return Ok(());
    }

    let store = ArchiveStore::new(archive_dir);
    let entries = store
        .list()
        .with_context(|| format!("Failed to scan {}", archive_dir.display()))?;
    if entries.is_empty() {
        println!("No archives found in {}", archive_dir.display());
        return Ok(());
    }

    println!(
        "{:<14} {:<6} {:>8}  {:<27} {:<27} {:>9}",
        "Symbol", "Int", "Rows", "First", "Last", "Size"
    );
    println!("{}", "-".repeat(96));

    let mut total_size = 0u64;
    let mut corrupt = 0usize;
    for entry in &entries {
        let size = std::fs::metadata(&entry.path).map(|m| m.len()).unwrap_or(0);
        total_size += size;
        match &entry.health {
            ArchiveHealth::Ok { rows, first, last } => println!(
                "{:<14} {:<6} {:>8}  {:<27} {:<27} {:>9}",
                entry.symbol,
                entry.interval.code(),
                rows,
                first.to_string(),
                last.to_string(),
                format_size(size)
            ),
            ArchiveHealth::Empty => println!(
                "{:<14} {:<6} {:>8}  {:<27} {:<27} {:>9}",
                entry.symbol,
                entry.interval.code(),
                0,
                "(empty)",
                "",
                format_size(size)
            ),
            ArchiveHealth::Corrupt(reason) => {
                corrupt += 1;
                println!(
                    "{:<14} {:<6} {:>8}  CORRUPT: {reason}",
                    entry.symbol,
                    entry.interval.code(),
                    "-"
                );
            }
        }
    }

    println!("{}", "-".repeat(96));
    println!(
        "{} archives, {} corrupt, {} total",
        entries.len(),
        corrupt,
        format_size(total_size)
    );
    Ok(())
}

fn run_intervals() {
    println!("{:<6} {:<15} {:<10}", "Code", "Query", "Limit");
    for interval in Interval::ALL {
        let policy = policy_for(interval);
        let kind = match policy.kind {
            QueryKind::BoundedStart => "bounded start",
            QueryKind::RollingWindow => "rolling window",
        };
        println!("{:<6} {:<15} {:<10}", interval.code(), kind, policy.limit.to_string());
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
