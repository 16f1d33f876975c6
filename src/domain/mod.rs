//! Pool-agnostic types: pool limits, trial parameters, statistics snapshots.

pub mod pool_config;
pub mod snapshot;
pub mod trial;

pub use pool_config::{IdleRetention, PoolConfig, DEFAULT_ACQUIRE_TIMEOUT};
pub use snapshot::{Regime, StatSnapshot};
pub use trial::{OperationTally, TrialParameters, TrialResult, Workload};
