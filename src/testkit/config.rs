//! Canonical test configurations.
//!
//! Single source of truth for trial parameters used across tests.

use std::time::Duration;

use crate::domain::{PoolConfig, TrialParameters, Workload};

/// Pool config without lifetime or idle-time limits and a short acquire
/// timeout, so a stuck test fails instead of hanging.
pub fn pool(max_open: u32, max_idle: i64) -> PoolConfig {
    PoolConfig::new(max_open, max_idle, Duration::ZERO, Duration::ZERO)
        .with_acquire_timeout(Duration::from_secs(10))
}

/// Trial running `SELECT 1` against [`pool`].
pub fn trial(
    name: &str,
    concurrency: usize,
    ops_per_worker: usize,
    max_open: u32,
    max_idle: i64,
) -> TrialParameters {
    TrialParameters::new(name, concurrency, ops_per_worker, pool(max_open, max_idle))
}

/// Like [`trial`], but every operation keeps its connection for `hold`.
pub fn held_trial(
    name: &str,
    concurrency: usize,
    ops_per_worker: usize,
    max_open: u32,
    max_idle: i64,
    hold: Duration,
) -> TrialParameters {
    trial(name, concurrency, ops_per_worker, max_open, max_idle)
        .with_workload(Workload::new("SELECT 1", hold))
}
