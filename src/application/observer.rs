//! Pool statistics observer.
//!
//! Polls the pool on a fixed interval, logs every snapshot, and stops once the
//! pool is quiescent. The pool offers no change notifications, so polling
//! for `in_use == 0` is the termination heuristic: a worker may acquire again
//! right after the observer stops. That only ends logging early; worker
//! completion is tracked separately by the runner.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::domain::StatSnapshot;
use crate::error::StatsError;
use crate::port::outbound::pool::PoolHandle;

/// Default time between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How observation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverOutcome {
    /// A snapshot showed no connection in use.
    Quiescent(StatSnapshot),
    /// The stats accessor failed; observation stopped.
    StatsUnavailable(StatsError),
    /// The trial was cancelled. Carries the last snapshot, if any.
    Cancelled(Option<StatSnapshot>),
}

impl ObserverOutcome {
    pub fn last_snapshot(&self) -> Option<&StatSnapshot> {
        match self {
            Self::Quiescent(s) => Some(s),
            Self::Cancelled(s) => s.as_ref(),
            Self::StatsUnavailable(_) => None,
        }
    }

    pub fn stats_available(&self) -> bool {
        !matches!(self, Self::StatsUnavailable(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolObserver {
    interval: Duration,
}

impl PoolObserver {
    /// Intervals below one millisecond are raised to one millisecond.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until quiescent.
    ///
    /// The first poll happens immediately. Before any worker has acquired,
    /// a fresh pool is trivially quiescent, so a quiescent snapshot only ends
    /// observation once the pool has shown activity or `workers_done` is
    /// cancelled.
    pub async fn observe(
        &self,
        pool: Arc<dyn PoolHandle>,
        workers_done: CancellationToken,
        cancel: CancellationToken,
    ) -> ObserverOutcome {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut polls: u64 = 0;
        let mut active = false;
        let mut last = None;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(polls, "Observation cancelled");
                    return ObserverOutcome::Cancelled(last);
                }
                _ = ticker.tick() => {}
            }

            // Sampled before the read so a snapshot taken after the workers
            // finished is what ends observation.
            let workers_finished = workers_done.is_cancelled();

            let snapshot = match pool.stats() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!(polls, error = %e, "Stats read failed, observer stopping");
                    return ObserverOutcome::StatsUnavailable(e);
                }
            };
            polls += 1;
            log_snapshot(polls, &snapshot);

            active |= snapshot.has_activity();
            if snapshot.is_quiescent() && (active || workers_finished) {
                info!(polls, "Pool quiescent");
                return ObserverOutcome::Quiescent(snapshot);
            }
            last = Some(snapshot);
        }
    }
}

impl Default for PoolObserver {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

/// One structured line per poll carrying every counter.
pub(crate) fn log_snapshot(poll: u64, s: &StatSnapshot) {
    info!(
        poll,
        max_open = s.max_open,
        open = s.open_connections,
        idle = s.idle_connections,
        in_use = s.in_use_connections,
        max_idle_closed = s.max_idle_closed,
        max_lifetime_closed = s.max_lifetime_closed,
        max_idle_time_closed = s.max_idle_time_closed,
        wait_count = s.wait_count,
        wait_duration_us = s.wait_duration.as_micros() as u64,
        "Stat"
    );
    if !s.is_consistent() {
        debug!(poll, "Snapshot gauges disagree (open != idle + in_use)");
    }
}
