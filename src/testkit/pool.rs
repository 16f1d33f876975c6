//! In-process [`PoolHandle`] and [`PoolConnector`] doubles.
//!
//! - [`ScriptedPool`]: a semaphore-bounded pool with scripted operation
//!   failures, panics and stats failures. Best for: worker, observer and
//!   runner behaviour without a database.
//! - [`ScriptedConnector`]: hands out `ScriptedPool`s built by a closure, or
//!   fails every connect.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::domain::{PoolConfig, StatSnapshot, Workload};
use crate::error::{OperationError, SetupError, StatsError};
use crate::port::outbound::pool::{PoolConnector, PoolHandle};

/// A pool that never touches a database.
///
/// `max_open` operations run at once; later ones queue on a semaphore and
/// are counted as waits. Connections are never closed, so the close counters
/// stay at zero.
pub struct ScriptedPool {
    config: PoolConfig,
    slots: Semaphore,
    delay: Duration,
    fail_every: Option<u64>,
    panic_on_attempt: Option<u64>,
    fail_stats_after: Option<u64>,
    executed: AtomicU64,
    polls: AtomicU64,
    in_use: AtomicU32,
    opened: AtomicU32,
    wait_count: AtomicU64,
    wait_nanos: AtomicU64,
}

impl ScriptedPool {
    pub fn new(max_open: u32) -> Self {
        Self {
            config: PoolConfig::new(max_open, i64::from(max_open), Duration::ZERO, Duration::ZERO),
            slots: Semaphore::new(max_open as usize),
            delay: Duration::ZERO,
            fail_every: None,
            panic_on_attempt: None,
            fail_stats_after: None,
            executed: AtomicU64::new(0),
            polls: AtomicU64::new(0),
            in_use: AtomicU32::new(0),
            opened: AtomicU32::new(0),
            wait_count: AtomicU64::new(0),
            wait_nanos: AtomicU64::new(0),
        }
    }

    /// Keep each connection checked out for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every `n`th operation fails with a query error.
    pub fn fail_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// The `n`th operation panics instead of returning.
    pub fn panic_on_attempt(mut self, n: u64) -> Self {
        self.panic_on_attempt = Some(n);
        self
    }

    /// The first `n` stats reads succeed, every later one fails.
    pub fn fail_stats_after(mut self, n: u64) -> Self {
        self.fail_stats_after = Some(n);
        self
    }

    /// Operations attempted, failed ones included.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::SeqCst)
    }

    /// Stats reads, failed ones included.
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }

    /// Record one completed operation without going through `execute`.
    pub fn execute_now(&self) {
        self.executed.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_max(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PoolHandle for ScriptedPool {
    async fn execute(&self, _workload: &Workload) -> Result<(), OperationError> {
        let attempt = self.executed.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on_attempt == Some(attempt) {
            panic!("scripted panic on attempt {attempt}");
        }

        let permit = match self.slots.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                let started = Instant::now();
                let permit = self
                    .slots
                    .acquire()
                    .await
                    .map_err(|e| OperationError::Acquire(e.to_string()))?;
                self.wait_count.fetch_add(1, Ordering::SeqCst);
                self.wait_nanos
                    .fetch_add(started.elapsed().as_nanos() as u64, Ordering::SeqCst);
                permit
            }
        };

        let in_use = InUse::enter(&self.in_use);
        self.opened.fetch_max(in_use.count, Ordering::SeqCst);

        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }

        drop(in_use);
        drop(permit);

        match self.fail_every {
            Some(n) if attempt % n == 0 => Err(OperationError::Query(format!(
                "scripted failure on attempt {attempt}"
            ))),
            _ => Ok(()),
        }
    }

    fn stats(&self) -> Result<StatSnapshot, StatsError> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = self.fail_stats_after {
            if poll > limit {
                return Err(StatsError::Unavailable(format!(
                    "scripted stats failure on poll {poll}"
                )));
            }
        }

        let in_use = self.in_use.load(Ordering::SeqCst);
        let open = self.opened.load(Ordering::SeqCst).max(in_use);
        Ok(StatSnapshot {
            max_open: self.config.max_open,
            open_connections: open,
            idle_connections: open - in_use,
            in_use_connections: in_use,
            wait_count: self.wait_count.load(Ordering::SeqCst),
            wait_duration: Duration::from_nanos(self.wait_nanos.load(Ordering::SeqCst)),
            ..Default::default()
        })
    }

    fn config(&self) -> &PoolConfig {
        &self.config
    }
}

/// Holds one `in_use` slot; released even when the operation is dropped
/// mid-flight.
struct InUse<'a> {
    gauge: &'a AtomicU32,
    count: u32,
}

impl<'a> InUse<'a> {
    fn enter(gauge: &'a AtomicU32) -> Self {
        let count = gauge.fetch_add(1, Ordering::SeqCst) + 1;
        Self { gauge, count }
    }
}

impl Drop for InUse<'_> {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::SeqCst);
    }
}

type BuildFn = dyn Fn(&PoolConfig) -> ScriptedPool + Send + Sync;

/// Connector handing out [`ScriptedPool`]s.
///
/// Clones share the build closure, the connect counter and the last pool, so
/// a test can keep one clone and pass another to the runner.
#[derive(Clone)]
pub struct ScriptedConnector {
    build: Option<Arc<BuildFn>>,
    connects: Arc<AtomicU32>,
    last: Arc<Mutex<Option<Arc<ScriptedPool>>>>,
}

impl ScriptedConnector {
    pub fn new(build: impl Fn(&PoolConfig) -> ScriptedPool + Send + Sync + 'static) -> Self {
        Self {
            build: Some(Arc::new(build)),
            connects: Arc::new(AtomicU32::new(0)),
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// A connector whose every connect fails with a setup error.
    pub fn failing() -> Self {
        Self {
            build: None,
            connects: Arc::new(AtomicU32::new(0)),
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// The pool handed out by the most recent successful connect.
    pub fn last_pool(&self) -> Option<Arc<ScriptedPool>> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl PoolConnector for ScriptedConnector {
    async fn connect(&self, config: &PoolConfig) -> Result<Arc<dyn PoolHandle>, SetupError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let build = self.build.as_ref().ok_or_else(|| SetupError::Connect {
            url: "scripted".into(),
            reason: "connection refused".into(),
        })?;

        let pool = Arc::new(build(config));
        *self.last.lock() = Some(Arc::clone(&pool));
        Ok(pool)
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}
