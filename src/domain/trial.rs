//! Trial inputs and outcome.

use std::ops::AddAssign;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::pool_config::PoolConfig;
use super::snapshot::{Regime, StatSnapshot};
use crate::error::ConfigError;

/// Statement each operation runs and how long it keeps the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub query: String,
    /// Time the connection stays checked out after the statement, standing
    /// in for a slow server-side query.
    pub hold: Duration,
}

impl Workload {
    pub fn new(query: impl Into<String>, hold: Duration) -> Self {
        Self {
            query: query.into(),
            hold,
        }
    }
}

impl Default for Workload {
    fn default() -> Self {
        Self::new("SELECT 1", Duration::ZERO)
    }
}

/// Everything that defines one trial. Not mutated while the trial runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialParameters {
    pub name: String,
    pub concurrency: usize,
    pub ops_per_worker: usize,
    pub pool: PoolConfig,
    pub workload: Workload,
}

impl TrialParameters {
    pub fn new(
        name: impl Into<String>,
        concurrency: usize,
        ops_per_worker: usize,
        pool: PoolConfig,
    ) -> Self {
        Self {
            name: name.into(),
            concurrency,
            ops_per_worker,
            pool,
            workload: Workload::default(),
        }
    }

    #[must_use]
    pub fn with_workload(mut self, workload: Workload) -> Self {
        self.workload = workload;
        self
    }

    /// Operations the worker group will attempt in total.
    pub fn total_operations(&self) -> u64 {
        (self.concurrency as u64).saturating_mul(self.ops_per_worker as u64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency",
                reason: "must be > 0".into(),
            });
        }
        if self.workload.query.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "query" });
        }
        self.pool.validate()
    }
}

/// Success and failure counts of the operations in one trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationTally {
    pub succeeded: u64,
    pub failed: u64,
}

impl OperationTally {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }
}

impl AddAssign for OperationTally {
    fn add_assign(&mut self, rhs: Self) {
        self.succeeded += rhs.succeeded;
        self.failed += rhs.failed;
    }
}

/// Outcome of one completed trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Closing snapshot read after the workers finished; `None` when stats
    /// were unavailable.
    pub final_snapshot: Option<StatSnapshot>,
    pub operations: OperationTally,
}

impl TrialResult {
    pub fn regime(&self) -> Option<Regime> {
        self.final_snapshot.as_ref().map(StatSnapshot::regime)
    }
}
