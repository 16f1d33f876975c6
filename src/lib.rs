//! Poolbench - connection-pool behaviour under controlled concurrency.
//!
//! Opens a database connection pool with fixed limits (maximum open and idle
//! connections, connection lifetime, idle timeout), drives it with a fixed
//! number of workers issuing a fixed number of queries each, and logs the
//! pool's statistics until no connection is in use.
//!
//! # Architecture
//!
//! - [`domain`] - Pool limits, trial parameters, statistics snapshots
//! - [`port`] - The `PoolHandle`/`PoolConnector` contracts the harness drives
//! - [`adapter`] - SQLite pool (r2d2 + Diesel) and the CLI
//! - [`application`] - Worker group, observer, trial runner and harness
//! - [`infrastructure`] - Configuration, logging and wiring
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use poolbench::adapter::outbound::sqlite::SqliteConnector;
//! use poolbench::application::{PoolObserver, SimulationRunner};
//! use poolbench::domain::{PoolConfig, TrialParameters};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> poolbench::error::Result<()> {
//! let pool = PoolConfig::new(10, -1, Duration::ZERO, Duration::ZERO);
//! let params = TrialParameters::new("without-pool", 10, 20, pool);
//! let runner = SimulationRunner::new(Arc::new(SqliteConnector::default()), PoolObserver::default());
//! let result = runner.run_trial(&params, &CancellationToken::new()).await?;
//! println!("{:?}", result.regime());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
