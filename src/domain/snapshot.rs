//! Point-in-time pool statistics.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// One read of the pool's counters.
///
/// Gauges (`open`, `idle`, `in_use`) describe the moment of the read; the
/// remaining fields are cumulative since the pool was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatSnapshot {
    pub max_open: u32,
    pub open_connections: u32,
    pub idle_connections: u32,
    pub in_use_connections: u32,
    /// Connections closed on release because idle retention was full.
    pub max_idle_closed: u64,
    pub max_lifetime_closed: u64,
    pub max_idle_time_closed: u64,
    pub wait_count: u64,
    pub wait_duration: Duration,
}

impl StatSnapshot {
    /// No connection is checked out.
    pub fn is_quiescent(&self) -> bool {
        self.in_use_connections == 0
    }

    /// `open == idle + in_use`. Reads race with the pool, so a single
    /// snapshot may briefly disagree.
    pub fn is_consistent(&self) -> bool {
        self.open_connections == self.idle_connections + self.in_use_connections
    }

    /// The pool has done anything at all since it was opened.
    pub fn has_activity(&self) -> bool {
        self.open_connections > 0
            || self.in_use_connections > 0
            || self.wait_count > 0
            || self.max_idle_closed > 0
            || self.max_lifetime_closed > 0
            || self.max_idle_time_closed > 0
    }

    pub fn regime(&self) -> Regime {
        match (self.max_idle_closed > 0, self.wait_count > 0) {
            (false, false) => Regime::Reused,
            (false, true) => Regime::Queued,
            (true, false) => Regime::Churned,
            (true, true) => Regime::Saturated,
        }
    }
}

/// Qualitative pool behaviour over a trial.
///
/// Exact counts vary with scheduling; the regime is what repeated runs of the
/// same parameters are expected to agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// Connections were reused without waiting or eviction.
    Reused,
    /// Requests queued for a slot but released connections were kept.
    Queued,
    /// Released connections were closed, nobody waited.
    Churned,
    /// Requests queued and released connections were closed.
    Saturated,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reused => "reused",
            Self::Queued => "queued",
            Self::Churned => "churned",
            Self::Saturated => "saturated",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(open: u32, idle: u32, in_use: u32) -> StatSnapshot {
        StatSnapshot {
            max_open: 10,
            open_connections: open,
            idle_connections: idle,
            in_use_connections: in_use,
            ..Default::default()
        }
    }

    #[test]
    fn quiescent_when_nothing_in_use() {
        assert!(snapshot(3, 3, 0).is_quiescent());
        assert!(!snapshot(3, 2, 1).is_quiescent());
    }

    #[test]
    fn consistency_checks_gauge_sum() {
        assert!(snapshot(5, 2, 3).is_consistent());
        assert!(!snapshot(5, 2, 2).is_consistent());
    }

    #[test]
    fn fresh_pool_has_no_activity() {
        assert!(!StatSnapshot::default().has_activity());
        assert!(snapshot(1, 1, 0).has_activity());
        let closed_only = StatSnapshot {
            max_idle_closed: 4,
            ..Default::default()
        };
        assert!(closed_only.has_activity());
    }

    #[test]
    fn regime_follows_closes_and_waits() {
        let mut s = StatSnapshot::default();
        assert_eq!(s.regime(), Regime::Reused);
        s.wait_count = 3;
        assert_eq!(s.regime(), Regime::Queued);
        s.max_idle_closed = 1;
        assert_eq!(s.regime(), Regime::Saturated);
        s.wait_count = 0;
        assert_eq!(s.regime(), Regime::Churned);
    }
}
