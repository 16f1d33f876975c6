//! Pool port: the contract the harness needs from a connection pool.
//!
//! The harness never allocates, evicts or accounts connections itself. It
//! only runs operations through a [`PoolHandle`] and reads its counters.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{PoolConfig, StatSnapshot, Workload};
use crate::error::{OperationError, SetupError, StatsError};

/// A configured, shareable pool.
///
/// Implementations must be safe to call from many tasks at once.
#[async_trait]
pub trait PoolHandle: Send + Sync {
    /// Acquire a connection, run the workload statement, release.
    ///
    /// May wait for a free slot when all `max_open` connections are in use.
    async fn execute(&self, workload: &Workload) -> Result<(), OperationError>;

    /// Current counters. Reads need not be atomic across fields.
    fn stats(&self) -> Result<StatSnapshot, StatsError>;

    /// Limits the pool was opened with.
    fn config(&self) -> &PoolConfig;
}

/// Opens pools configured with given limits.
#[async_trait]
pub trait PoolConnector: Send + Sync {
    /// Open a pool; fails when the backend cannot be reached.
    async fn connect(&self, config: &PoolConfig) -> Result<Arc<dyn PoolHandle>, SetupError>;

    /// Backend description for logs.
    fn describe(&self) -> String;
}
