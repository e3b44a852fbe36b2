//! Retention policy table: how far back the provider serves each interval.
//!
//! The provider refuses open-ended historical queries for intraday sampling:
//! those intervals can only be requested as "the most recent N days". Daily
//! and coarser intervals accept an explicit start date and have full history.
//! Both facts live here, once, so the sync engine never branches on interval
//! codes.

use crate::domain::Interval;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum historical span fetchable for an interval in one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionLimit {
    Days(u32),
    Unbounded,
}

impl RetentionLimit {
    /// Provider range selector: `"60d"` or `"max"`.
    pub fn range_code(&self) -> String {
        match self {
            RetentionLimit::Days(n) => format!("{n}d"),
            RetentionLimit::Unbounded => "max".to_string(),
        }
    }
}

impl fmt::Display for RetentionLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.range_code())
    }
}

/// Which request shape the provider accepts for an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    /// Explicit start date accepted; incremental fetches are possible.
    BoundedStart,
    /// Only "most recent N days"; the whole window is re-requested every sync.
    RollingWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub kind: QueryKind,
    pub limit: RetentionLimit,
}

/// Retention policy for an interval. Total over [`Interval::ALL`].
pub fn policy_for(interval: Interval) -> RetentionPolicy {
    use Interval::*;
    use QueryKind::*;
    use RetentionLimit::*;

    let (kind, limit) = match interval {
        Minute1 => (RollingWindow, Days(7)),
        Minute2 | Minute5 | Minute15 | Minute30 | Minute90 => (RollingWindow, Days(60)),
        Minute60 | Hour1 => (RollingWindow, Days(730)),
        Day1 | Day5 | Week1 | Month1 | Month3 => (BoundedStart, Unbounded),
    };
    RetentionPolicy { kind, limit }
}

/// Retention limit for an interval.
pub fn limit_for(interval: Interval) -> RetentionLimit {
    policy_for(interval).limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_interval_has_a_limit() {
        for interval in Interval::ALL {
            let _ = limit_for(interval);
        }
    }

    #[test]
    fn limit_consistent_with_query_kind() {
        // Rolling windows must be bounded, bounded-start intervals have full history.
        for interval in Interval::ALL {
            let policy = policy_for(interval);
            match policy.kind {
                QueryKind::RollingWindow => {
                    assert!(matches!(policy.limit, RetentionLimit::Days(_)), "{interval}")
                }
                QueryKind::BoundedStart => {
                    assert_eq!(policy.limit, RetentionLimit::Unbounded, "{interval}")
                }
            }
        }
    }

    #[test]
    fn known_provider_limits() {
        assert_eq!(limit_for(Interval::Minute1), RetentionLimit::Days(7));
        assert_eq!(limit_for(Interval::Minute15), RetentionLimit::Days(60));
        assert_eq!(limit_for(Interval::Hour1), RetentionLimit::Days(730));
        assert_eq!(limit_for(Interval::Day1), RetentionLimit::Unbounded);
        assert_eq!(policy_for(Interval::Month3).kind, QueryKind::BoundedStart);
    }

    #[test]
    fn range_codes() {
        assert_eq!(RetentionLimit::Days(60).range_code(), "60d");
        assert_eq!(RetentionLimit::Unbounded.range_code(), "max");
    }
}
