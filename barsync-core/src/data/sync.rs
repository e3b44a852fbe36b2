//! Sync engine: brings one (instrument, interval) archive up to date.
//!
//! Per task: one load, at most one provider fetch, at most one save. The
//! request shape comes from the retention policy:
//!
//! - no archive → the full retention window (or full history)
//! - bounded-start intervals → from the day after the last stored bar, or
//!   nothing when that day is still in the future
//! - rolling-window intervals → the whole window again, merged by
//!   reconciliation. When the previous sync is older than the window, the
//!   bars in between are not recoverable and the archive keeps a gap.
//!
//! Failures end the task without touching the archive and are returned to
//! the caller; nothing here retries or knows about other tasks.

use super::archive::{reconcile, ArchiveError, ArchiveStore};
use super::provider::{DataError, FetchRequest, ProviderGateway};
use super::retention::{policy_for, QueryKind};
use crate::domain::{BarTimestamp, Instrument, Interval};
use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One unit of work: bring this archive up to date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncTask {
    pub instrument: Instrument,
    pub interval: Interval,
}

impl SyncTask {
    pub fn new(instrument: Instrument, interval: Interval) -> Self {
        Self {
            instrument,
            interval,
        }
    }
}

impl fmt::Display for SyncTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.instrument.symbol, self.interval)
    }
}

/// Where a task stands after inspecting the stored archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    NoArchive,
    HasArchiveFresh,
    HasArchiveStale,
    Done,
}

/// What the engine decided to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPlan {
    /// No usable archive: request the whole retention window.
    FullWindow(FetchRequest),
    /// Bounded-start interval with a stale archive: request from a start date.
    Incremental(FetchRequest),
    /// Rolling-window interval with an archive: re-request the whole window.
    RollingWindow(FetchRequest),
    /// Archive is current; no request.
    Skip,
}

impl SyncPlan {
    pub fn state(&self) -> SyncState {
        match self {
            SyncPlan::FullWindow(_) => SyncState::NoArchive,
            SyncPlan::Incremental(_) | SyncPlan::RollingWindow(_) => SyncState::HasArchiveStale,
            SyncPlan::Skip => SyncState::HasArchiveFresh,
        }
    }

    pub fn request(&self) -> Option<FetchRequest> {
        match self {
            SyncPlan::FullWindow(r) | SyncPlan::Incremental(r) | SyncPlan::RollingWindow(r) => {
                Some(*r)
            }
            SyncPlan::Skip => None,
        }
    }
}

/// Decide the fetch for an interval given the latest stored timestamp.
///
/// "Now" is read in the stored timestamp's zone; naive archives are compared
/// against local wall-clock time.
pub fn plan(last_stored: Option<BarTimestamp>, interval: Interval, now: DateTime<Utc>) -> SyncPlan {
    let policy = policy_for(interval);
    let window = FetchRequest::Period(policy.limit);

    let Some(last) = last_stored else {
        return SyncPlan::FullWindow(window);
    };

    match policy.kind {
        QueryKind::RollingWindow => SyncPlan::RollingWindow(window),
        QueryKind::BoundedStart => {
            let Some(start) = last.checked_add(Duration::days(1)) else {
                return SyncPlan::Skip;
            };
            let due = match start {
                BarTimestamp::Aware(start) => start <= now.with_timezone(start.offset()),
                BarTimestamp::Naive(start) => start <= now.with_timezone(&Local).naive_local(),
            };
            if due {
                SyncPlan::Incremental(FetchRequest::Since(start.date()))
            } else {
                SyncPlan::Skip
            }
        }
    }
}

/// Result of a task that finished without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// First archive written for this pair.
    Created { rows: usize },
    /// Existing archive merged and rewritten.
    Updated { rows: usize, added: usize },
    /// Archive already current; nothing fetched.
    UpToDate,
    /// Provider answered with no rows; nothing written.
    NoData,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Created { rows } => write!(f, "created ({rows} rows)"),
            SyncOutcome::Updated { rows, added } => write!(f, "updated (+{added}, {rows} rows)"),
            SyncOutcome::UpToDate => f.write_str("up to date"),
            SyncOutcome::NoData => f.write_str("no data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub plan: SyncPlan,
    pub outcome: SyncOutcome,
    /// The stored archive was unreadable and has been rebuilt from scratch.
    pub reset_corrupt_archive: bool,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("provider: {0}")]
    Provider(#[from] DataError),

    #[error("archive: {0}")]
    Archive(#[from] ArchiveError),
}

impl SyncError {
    /// Worth another attempt later in the same run.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Provider(e) if e.is_transient())
    }
}

/// Drives single tasks against an archive store and a provider.
///
/// Holds no mutable state; one engine is shared by every worker of a run.
pub struct SyncEngine<'a> {
    store: &'a ArchiveStore,
    provider: &'a dyn ProviderGateway,
    market_suffix: String,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        store: &'a ArchiveStore,
        provider: &'a dyn ProviderGateway,
        market_suffix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            market_suffix: market_suffix.into(),
        }
    }

    pub fn store(&self) -> &ArchiveStore {
        self.store
    }

    pub fn provider(&self) -> &dyn ProviderGateway {
        self.provider
    }

    pub fn sync(&self, task: &SyncTask) -> Result<SyncReport, SyncError> {
        self.sync_at(task, Utc::now())
    }

    /// Run one task with an explicit notion of "now".
    pub fn sync_at(&self, task: &SyncTask, now: DateTime<Utc>) -> Result<SyncReport, SyncError> {
        let symbol = &task.instrument.symbol;
        let interval = task.interval;

        let (existing, reset_corrupt_archive) =
            match self.store.load_checked(&task.instrument, interval) {
                Ok(archive) => (archive, false),
                Err(e) => {
                    warn!(
                        %symbol, %interval, error = %e,
                        "archive unreadable, previous data discarded; resyncing full window"
                    );
                    (None, true)
                }
            };

        let plan = plan(
            existing.as_ref().and_then(|a| a.last_timestamp()),
            interval,
            now,
        );
        debug!(%symbol, %interval, state = ?plan.state(), ?plan, "planned sync");

        let report = |outcome| SyncReport {
            plan,
            outcome,
            reset_corrupt_archive,
        };

        let Some(request) = plan.request() else {
            debug!(%symbol, %interval, state = ?SyncState::Done, "archive is current");
            return Ok(report(SyncOutcome::UpToDate));
        };

        let provider_symbol = task.instrument.provider_symbol(&self.market_suffix);
        let incoming = self.provider.fetch(&provider_symbol, interval, request)?;
        if incoming.is_empty() {
            debug!(%symbol, %interval, state = ?SyncState::Done, "provider returned no rows");
            return Ok(report(SyncOutcome::NoData));
        }

        let before = existing.as_ref().map(|a| a.len());
        let fetched = incoming.len();
        let merged = reconcile(existing, incoming);
        self.store.save(&task.instrument, interval, &merged)?;

        let rows = merged.len();
        let outcome = match before {
            None => SyncOutcome::Created { rows },
            Some(before) => SyncOutcome::Updated {
                rows,
                added: rows.saturating_sub(before),
            },
        };
        info!(%symbol, %interval, fetched, rows, "archive written");
        Ok(report(outcome))
    }
}
