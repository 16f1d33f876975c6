//! Database connection management using Diesel and r2d2.
//!
//! Verifies the backend is reachable and builds a connection pool whose
//! limits come from a [`PoolConfig`].

use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::{Connection, SqliteConnection};
use r2d2::Pool;

use super::manager::{ConnectionLimits, PoolCounters, TracingErrorHandler, TrackedManager};
use crate::domain::PoolConfig;
use crate::error::SetupError;

/// Type alias for the tracked SQLite connection pool.
pub type DbPool = Pool<TrackedManager>;

/// Open one connection outside the pool and run a trivial statement.
///
/// # Errors
/// Returns an error if the database cannot be opened or queried.
pub fn ping(database_url: &str) -> Result<(), SetupError> {
    let connect_err = |reason: String| SetupError::Connect {
        url: database_url.to_string(),
        reason,
    };
    let mut conn = SqliteConnection::establish(database_url).map_err(|e| connect_err(e.to_string()))?;
    conn.batch_execute("SELECT 1")
        .map_err(|e| connect_err(e.to_string()))
}

/// Create a connection pool for the given database URL.
///
/// Connections are opened lazily; r2d2 pre-opens nothing (`min_idle = 0`)
/// and its own reaper is disabled because lifetimes are enforced by the
/// manager.
///
/// # Errors
/// Returns an error if the pool cannot be created.
pub(crate) fn create_pool(
    database_url: &str,
    config: &PoolConfig,
    backend_limit: Option<u32>,
    counters: Arc<PoolCounters>,
) -> Result<DbPool, SetupError> {
    let limits = ConnectionLimits {
        retention: config.effective_max_idle(),
        max_lifetime: config.max_lifetime,
        max_idle_time: config.max_idle_time,
        backend_limit,
    };
    let manager = TrackedManager::new(database_url, limits, counters);

    Pool::builder()
        .max_size(config.max_open)
        .min_idle(Some(0))
        .max_lifetime(None)
        .idle_timeout(None)
        .connection_timeout(config.acquire_timeout)
        // The manager maintains its idle gauge in `is_valid`.
        .test_on_check_out(true)
        .error_handler(Box::new(TracingErrorHandler))
        .build(manager)
        .map_err(|e| SetupError::Build(e.to_string()))
}
