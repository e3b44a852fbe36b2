//! Bar: the fundamental market data unit.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp of a bar, with or without a UTC offset attached.
///
/// The provider returns zone-aware timestamps, but archives written by other
/// tools may carry naive wall-clock times. Reconciliation attaches a zone to
/// naive timestamps; it never converts an aware one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarTimestamp {
    Naive(NaiveDateTime),
    Aware(DateTime<FixedOffset>),
}

impl BarTimestamp {
    /// Ordering key. Aware timestamps compare by UTC instant, naive ones by wall clock.
    ///
    /// Only meaningful between timestamps of the same kind; the archive store
    /// normalizes a table to one kind before comparing.
    pub fn sort_key(&self) -> NaiveDateTime {
        match self {
            BarTimestamp::Naive(dt) => *dt,
            BarTimestamp::Aware(dt) => dt.naive_utc(),
        }
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        match self {
            BarTimestamp::Naive(_) => None,
            BarTimestamp::Aware(dt) => Some(*dt.offset()),
        }
    }

    pub fn is_aware(&self) -> bool {
        matches!(self, BarTimestamp::Aware(_))
    }

    /// Wall-clock time as seen in the timestamp's own zone.
    pub fn local(&self) -> NaiveDateTime {
        match self {
            BarTimestamp::Naive(dt) => *dt,
            BarTimestamp::Aware(dt) => dt.naive_local(),
        }
    }

    /// Calendar date in the timestamp's own zone.
    pub fn date(&self) -> NaiveDate {
        self.local().date()
    }

    /// Attach `offset` to a naive timestamp, keeping its wall-clock reading.
    /// Aware timestamps are returned unchanged.
    pub fn localize(self, offset: FixedOffset) -> Self {
        match self {
            BarTimestamp::Naive(local) => {
                let utc = local - Duration::seconds(offset.local_minus_utc() as i64);
                BarTimestamp::Aware(DateTime::from_naive_utc_and_offset(utc, offset))
            }
            aware => aware,
        }
    }

    pub fn checked_add(&self, delta: Duration) -> Option<Self> {
        match self {
            BarTimestamp::Naive(dt) => dt.checked_add_signed(delta).map(BarTimestamp::Naive),
            BarTimestamp::Aware(dt) => dt.checked_add_signed(delta).map(BarTimestamp::Aware),
        }
    }

    /// Parse an archive timestamp cell.
    ///
    /// Accepts `YYYY-MM-DD HH:MM:SS±HH:MM`, RFC 3339, `YYYY-MM-DD HH:MM:SS`
    /// and a bare `YYYY-MM-DD` (midnight).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
            return Some(BarTimestamp::Aware(dt));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(BarTimestamp::Aware(dt));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Some(BarTimestamp::Naive(dt));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(BarTimestamp::Naive)
    }
}

impl fmt::Display for BarTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarTimestamp::Naive(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            BarTimestamp::Aware(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%:z")),
        }
    }
}

/// One OHLCV row for a single symbol at a single sampling point.
///
/// Prices are adjusted upstream. Missing prices are `NaN`, missing volume is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: BarTimestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}
