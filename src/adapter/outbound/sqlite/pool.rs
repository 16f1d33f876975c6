//! [`PoolHandle`] over the tracked r2d2 SQLite pool.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use r2d2::PooledConnection;

use super::database::connection::DbPool;
use super::database::manager::{clamp_gauge, PoolCounters, TrackedManager};
use crate::domain::{PoolConfig, StatSnapshot, Workload};
use crate::error::{OperationError, StatsError};
use crate::port::outbound::pool::PoolHandle;

/// A configured SQLite pool shared by all workers of a trial.
pub struct SqlitePool {
    pool: DbPool,
    counters: Arc<PoolCounters>,
    config: PoolConfig,
}

impl SqlitePool {
    pub(crate) fn new(pool: DbPool, counters: Arc<PoolCounters>, config: PoolConfig) -> Self {
        Self {
            pool,
            counters,
            config,
        }
    }
}

#[async_trait]
impl PoolHandle for SqlitePool {
    async fn execute(&self, workload: &Workload) -> Result<(), OperationError> {
        let pool = self.pool.clone();
        let counters = Arc::clone(&self.counters);
        let limits = AcquireLimits {
            max_open: self.config.max_open,
            timeout: self.config.acquire_timeout,
        };
        let query = workload.query.clone();
        let hold = workload.hold;

        tokio::task::spawn_blocking(move || {
            run_operation(&pool, &counters, limits, &query, hold)
        })
        .await
        .map_err(|e| OperationError::Join(e.to_string()))?
    }

    fn stats(&self) -> Result<StatSnapshot, StatsError> {
        let state = self.pool.state();
        let c = &self.counters;
        Ok(StatSnapshot {
            max_open: self.config.max_open,
            open_connections: state.connections,
            idle_connections: state.idle_connections,
            in_use_connections: clamp_gauge(c.in_use.load(Ordering::Relaxed)),
            max_idle_closed: c.max_idle_closed.load(Ordering::Relaxed),
            max_lifetime_closed: c.max_lifetime_closed.load(Ordering::Relaxed),
            max_idle_time_closed: c.max_idle_time_closed.load(Ordering::Relaxed),
            wait_count: c.wait_count.load(Ordering::Relaxed),
            wait_duration: Duration::from_nanos(c.wait_nanos.load(Ordering::Relaxed)),
        })
    }

    fn config(&self) -> &PoolConfig {
        &self.config
    }
}

/// Longest single checkout attempt. r2d2 wakes a blocked `get` only when a
/// connection returns to its idle list, never when a checkin closes one, so
/// waiters retry in short slices to notice freed slots.
const ACQUIRE_SLICE: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy)]
struct AcquireLimits {
    max_open: u32,
    timeout: Duration,
}

/// One blocking acquire-execute-release cycle.
///
/// A request counts as a wait when `max_open` other operations already hold
/// or wait for a connection; its whole acquire time is added to the wait
/// duration.
fn run_operation(
    pool: &DbPool,
    counters: &PoolCounters,
    limits: AcquireLimits,
    query: &str,
    hold: Duration,
) -> Result<(), OperationError> {
    let demand = Demand::enter(counters);
    let must_wait = demand.ahead >= i64::from(limits.max_open);

    let started = Instant::now();
    let acquired = acquire(pool, counters, limits.timeout);
    if must_wait {
        counters.record_wait(started.elapsed());
    }
    let mut checked_out = CheckedOut {
        conn: acquired?,
        _in_use: InUse::enter(counters),
    };

    checked_out
        .conn
        .raw()
        .batch_execute(query)
        .map_err(|e| OperationError::Query(e.to_string()))?;

    if !hold.is_zero() {
        std::thread::sleep(hold);
    }
    Ok(())
}

/// Check a connection out within `timeout`.
///
/// Fails early when the backend refused a connect while this operation was
/// waiting; each refusal fails one waiting operation.
fn acquire(
    pool: &DbPool,
    counters: &PoolCounters,
    timeout: Duration,
) -> Result<PooledConnection<TrackedManager>, OperationError> {
    let deadline = Instant::now() + timeout;
    loop {
        let slice = deadline
            .saturating_duration_since(Instant::now())
            .min(ACQUIRE_SLICE);
        match pool.get_timeout(slice) {
            Ok(conn) => return Ok(conn),
            Err(e) if counters.claim_refusal() => {
                return Err(OperationError::Acquire(format!(
                    "backend refused connection: {e}"
                )));
            }
            Err(e) if Instant::now() >= deadline => {
                return Err(OperationError::Acquire(e.to_string()));
            }
            Err(_) => {}
        }
    }
}

/// Membership in the pool's demand: operations holding or waiting for a
/// connection.
struct Demand<'a> {
    counters: &'a PoolCounters,
    ahead: i64,
}

impl<'a> Demand<'a> {
    fn enter(counters: &'a PoolCounters) -> Self {
        let ahead = counters.demand.fetch_add(1, Ordering::Relaxed);
        Self { counters, ahead }
    }
}

impl Drop for Demand<'_> {
    fn drop(&mut self) {
        self.counters.demand.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Counts one operation in `in_use` while alive.
struct InUse<'a> {
    counters: &'a PoolCounters,
}

impl<'a> InUse<'a> {
    fn enter(counters: &'a PoolCounters) -> Self {
        counters.in_use.fetch_add(1, Ordering::Relaxed);
        Self { counters }
    }
}

impl Drop for InUse<'_> {
    fn drop(&mut self) {
        self.counters.in_use.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Fields drop in declaration order: the connection is back in the pool
/// before the operation stops counting as in use.
struct CheckedOut<'a> {
    conn: PooledConnection<TrackedManager>,
    _in_use: InUse<'a>,
}
