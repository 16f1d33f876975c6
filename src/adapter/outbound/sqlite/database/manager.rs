//! Connection manager that applies the harness's pool limits on top of r2d2.
//!
//! r2d2 only knows `max_size`. Idle retention, max lifetime and max idle time
//! are enforced here through the manager hooks r2d2 calls on checkout
//! (`is_valid`) and checkin (`has_broken`), and every close is counted by
//! reason when the connection is dropped.
//!
//! The idle gauge mirrors r2d2's idle list: a connection joins it when it is
//! established or retained on checkin, and leaves it on checkout or close.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use diesel::{Connection, SqliteConnection};
use r2d2::{HandleError, ManageConnection};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::IdleRetention;

/// Errors raised while opening or validating a backend connection.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Connect(#[from] diesel::ConnectionError),

    #[error("too many connections (backend limit {limit})")]
    TooManyConnections { limit: u32 },

    #[error("connection exceeded max lifetime {limit:?}")]
    LifetimeExpired { limit: Duration },

    #[error("connection idle for {idle:?}, limit {limit:?}")]
    IdleExpired { idle: Duration, limit: Duration },
}

/// Why a tracked connection was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseReason {
    MaxIdle,
    MaxLifetime,
    MaxIdleTime,
}

/// Counters shared by the manager, its connections and the pool handle.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    /// Established connections, including ones reserved while connecting.
    pub(crate) open: AtomicI64,
    /// Connections sitting in the pool's idle list.
    pub(crate) idle: AtomicI64,
    /// Connections checked out by an operation.
    pub(crate) in_use: AtomicI64,
    /// Operations holding or waiting for a connection.
    pub(crate) demand: AtomicI64,
    pub(crate) max_idle_closed: AtomicU64,
    pub(crate) max_lifetime_closed: AtomicU64,
    pub(crate) max_idle_time_closed: AtomicU64,
    pub(crate) wait_count: AtomicU64,
    pub(crate) wait_nanos: AtomicU64,
    /// Connects the backend refused for exceeding its limit.
    pub(crate) refused: AtomicU64,
    /// Refusals no waiting operation has failed for yet.
    unclaimed_refusals: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn record_wait(&self, waited: Duration) {
        self.wait_count.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX);
        self.wait_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    fn record_refusal(&self) {
        self.refused.fetch_add(1, Ordering::Relaxed);
        self.unclaimed_refusals.fetch_add(1, Ordering::Relaxed);
    }

    /// Take one refusal on behalf of a waiting operation, which then fails.
    pub(crate) fn claim_refusal(&self) -> bool {
        self.unclaimed_refusals
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }

    fn record_close(&self, reason: CloseReason) {
        let counter = match reason {
            CloseReason::MaxIdle => &self.max_idle_closed,
            CloseReason::MaxLifetime => &self.max_lifetime_closed,
            CloseReason::MaxIdleTime => &self.max_idle_time_closed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub(crate) fn clamp_gauge(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// A SQLite connection with the bookkeeping the limits need.
pub struct TrackedConnection {
    conn: SqliteConnection,
    born: Instant,
    idle_since: Instant,
    idle: bool,
    close_reason: Option<CloseReason>,
    counters: Arc<PoolCounters>,
}

impl TrackedConnection {
    pub fn raw(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    fn enter_idle(&mut self) {
        self.idle = true;
        self.idle_since = Instant::now();
    }

    fn leave_idle(&mut self) {
        if std::mem::take(&mut self.idle) {
            self.counters.idle.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl Drop for TrackedConnection {
    fn drop(&mut self) {
        self.leave_idle();
        self.counters.open.fetch_sub(1, Ordering::Relaxed);
        if let Some(reason) = self.close_reason {
            self.counters.record_close(reason);
        }
    }
}

/// Limits enforced by [`TrackedManager`].
#[derive(Debug, Clone)]
pub struct ConnectionLimits {
    pub retention: IdleRetention,
    pub max_lifetime: Option<Duration>,
    pub max_idle_time: Option<Duration>,
    /// Emulated server-side cap on concurrent connections.
    pub backend_limit: Option<u32>,
}

/// r2d2 manager for SQLite connections with limit enforcement.
pub struct TrackedManager {
    database_url: String,
    limits: ConnectionLimits,
    counters: Arc<PoolCounters>,
}

impl TrackedManager {
    pub(crate) fn new(
        database_url: impl Into<String>,
        limits: ConnectionLimits,
        counters: Arc<PoolCounters>,
    ) -> Self {
        Self {
            database_url: database_url.into(),
            limits,
            counters,
        }
    }

    /// Reserve an idle slot for a connection coming back from checkout.
    fn admit_idle(&self) -> bool {
        let retention = self.limits.retention;
        self.counters
            .idle
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |idle| {
                (!retention.rejects(clamp_gauge(idle))).then_some(idle + 1)
            })
            .is_ok()
    }
}

impl ManageConnection for TrackedManager {
    type Connection = TrackedConnection;
    type Error = BackendError;

    fn connect(&self) -> Result<TrackedConnection, BackendError> {
        // Reserve the slot first so concurrent connects cannot overshoot the
        // backend limit.
        let previously_open = self.counters.open.fetch_add(1, Ordering::Relaxed);
        if let Some(limit) = self.limits.backend_limit {
            if previously_open >= i64::from(limit) {
                self.counters.open.fetch_sub(1, Ordering::Relaxed);
                self.counters.record_refusal();
                return Err(BackendError::TooManyConnections { limit });
            }
        }

        match SqliteConnection::establish(&self.database_url) {
            Ok(conn) => {
                // r2d2 puts every new connection on its idle list.
                self.counters.idle.fetch_add(1, Ordering::Relaxed);
                let now = Instant::now();
                Ok(TrackedConnection {
                    conn,
                    born: now,
                    idle_since: now,
                    idle: true,
                    close_reason: None,
                    counters: Arc::clone(&self.counters),
                })
            }
            Err(e) => {
                self.counters.open.fetch_sub(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    fn is_valid(&self, conn: &mut TrackedConnection) -> Result<(), BackendError> {
        conn.leave_idle();
        if let Some(limit) = self.limits.max_lifetime {
            if conn.born.elapsed() >= limit {
                conn.close_reason = Some(CloseReason::MaxLifetime);
                return Err(BackendError::LifetimeExpired { limit });
            }
        }
        if let Some(limit) = self.limits.max_idle_time {
            let idle = conn.idle_since.elapsed();
            if idle >= limit {
                conn.close_reason = Some(CloseReason::MaxIdleTime);
                return Err(BackendError::IdleExpired { idle, limit });
            }
        }
        Ok(())
    }

    fn has_broken(&self, conn: &mut TrackedConnection) -> bool {
        if let Some(limit) = self.limits.max_lifetime {
            if conn.born.elapsed() >= limit {
                conn.close_reason = Some(CloseReason::MaxLifetime);
                return true;
            }
        }

        if !self.admit_idle() {
            conn.close_reason = Some(CloseReason::MaxIdle);
            return true;
        }

        conn.enter_idle();
        false
    }
}

/// Routes r2d2's background connection errors into tracing.
#[derive(Debug, Clone, Copy)]
pub struct TracingErrorHandler;

impl HandleError<BackendError> for TracingErrorHandler {
    fn handle_error(&self, error: BackendError) {
        match error {
            BackendError::TooManyConnections { limit } => {
                warn!(limit, "Backend refused connection, too many connections");
            }
            other => debug!(error = %other, "Backend connection attempt failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(limits: ConnectionLimits) -> (TrackedManager, Arc<PoolCounters>) {
        let counters = Arc::new(PoolCounters::default());
        (
            TrackedManager::new(":memory:", limits, Arc::clone(&counters)),
            counters,
        )
    }

    fn limits(retention: IdleRetention) -> ConnectionLimits {
        ConnectionLimits {
            retention,
            max_lifetime: None,
            max_idle_time: None,
            backend_limit: None,
        }
    }

    /// Connect and check the connection out, as r2d2 does for a `get`.
    fn checked_out(m: &TrackedManager) -> TrackedConnection {
        let mut conn = m.connect().unwrap();
        m.is_valid(&mut conn).unwrap();
        conn
    }

    fn idle(counters: &PoolCounters) -> i64 {
        counters.idle.load(Ordering::Relaxed)
    }

    #[test]
    fn connect_and_drop_track_open_count() {
        let (m, counters) = manager(limits(IdleRetention::Limit(4)));
        let a = m.connect().unwrap();
        let b = m.connect().unwrap();
        assert_eq!(counters.open.load(Ordering::Relaxed), 2);
        assert_eq!(idle(&counters), 2);
        drop(a);
        drop(b);
        assert_eq!(counters.open.load(Ordering::Relaxed), 0);
        assert_eq!(idle(&counters), 0);
    }

    #[test]
    fn backend_limit_refuses_extra_connections() {
        let mut l = limits(IdleRetention::Limit(4));
        l.backend_limit = Some(1);
        let (m, counters) = manager(l);
        let _held = m.connect().unwrap();
        let err = m.connect().err().unwrap();
        assert!(matches!(err, BackendError::TooManyConnections { limit: 1 }));
        assert_eq!(counters.open.load(Ordering::Relaxed), 1);
        assert_eq!(counters.refused.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn each_refusal_is_claimed_once() {
        let mut l = limits(IdleRetention::Limit(4));
        l.backend_limit = Some(1);
        let (m, counters) = manager(l);
        let _held = m.connect().unwrap();
        assert!(m.connect().is_err());

        assert!(counters.claim_refusal());
        assert!(!counters.claim_refusal());
    }

    #[test]
    fn checkout_leaves_idle_list() {
        let (m, counters) = manager(limits(IdleRetention::Limit(4)));
        let conn = checked_out(&m);
        assert_eq!(idle(&counters), 0);
        drop(conn);
        assert_eq!(idle(&counters), 0);
    }

    #[test]
    fn disabled_retention_breaks_every_checkin() {
        let (m, counters) = manager(limits(IdleRetention::Disabled));
        let mut conn = checked_out(&m);
        assert!(m.has_broken(&mut conn));
        drop(conn);
        assert_eq!(counters.max_idle_closed.load(Ordering::Relaxed), 1);
        assert_eq!(idle(&counters), 0);
    }

    #[test]
    fn retention_keeps_connection_below_limit() {
        let (m, counters) = manager(limits(IdleRetention::Limit(1)));
        let mut conn = checked_out(&m);
        assert!(!m.has_broken(&mut conn));
        assert_eq!(idle(&counters), 1);
        drop(conn);
        assert_eq!(counters.max_idle_closed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn retention_closes_when_idle_slots_are_full() {
        let (m, counters) = manager(limits(IdleRetention::Limit(1)));
        let _idle = m.connect().unwrap();
        let mut released = checked_out(&m);
        assert!(m.has_broken(&mut released));
        drop(released);
        assert_eq!(counters.max_idle_closed.load(Ordering::Relaxed), 1);
        assert_eq!(idle(&counters), 1);
    }

    #[test]
    fn checked_out_connections_do_not_count_as_idle() {
        // Two connections handed out but not yet marked in use by the
        // operation still leave both idle slots free.
        let (m, counters) = manager(limits(IdleRetention::Limit(2)));
        let mut a = checked_out(&m);
        let mut b = checked_out(&m);
        assert_eq!(counters.in_use.load(Ordering::Relaxed), 0);

        assert!(!m.has_broken(&mut a));
        assert!(!m.has_broken(&mut b));
        assert_eq!(counters.max_idle_closed.load(Ordering::Relaxed), 0);
        assert_eq!(idle(&counters), 2);
    }

    #[test]
    fn expired_lifetime_is_counted_on_checkout() {
        let mut l = limits(IdleRetention::Limit(4));
        l.max_lifetime = Some(Duration::from_millis(1));
        let (m, counters) = manager(l);
        let mut conn = m.connect().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(
            m.is_valid(&mut conn),
            Err(BackendError::LifetimeExpired { .. })
        ));
        drop(conn);
        assert_eq!(counters.max_lifetime_closed.load(Ordering::Relaxed), 1);
        assert_eq!(counters.max_idle_time_closed.load(Ordering::Relaxed), 0);
        assert_eq!(idle(&counters), 0);
    }

    #[test]
    fn expired_idle_time_is_counted_on_checkout() {
        let mut l = limits(IdleRetention::Limit(4));
        l.max_idle_time = Some(Duration::from_millis(1));
        let (m, counters) = manager(l);
        let mut conn = m.connect().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(m.is_valid(&mut conn).is_err());
        drop(conn);
        assert_eq!(counters.max_idle_time_closed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn record_wait_accumulates_duration() {
        let counters = PoolCounters::default();
        counters.record_wait(Duration::from_millis(3));
        counters.record_wait(Duration::from_millis(4));
        assert_eq!(counters.wait_count.load(Ordering::Relaxed), 2);
        assert_eq!(
            counters.wait_nanos.load(Ordering::Relaxed),
            Duration::from_millis(7).as_nanos() as u64
        );
    }

    #[test]
    fn gauges_never_go_negative() {
        assert_eq!(clamp_gauge(-2), 0);
        assert_eq!(clamp_gauge(3), 3);
    }
}
