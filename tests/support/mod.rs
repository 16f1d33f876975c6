#![allow(dead_code)]

pub mod architecture;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use poolbench::adapter::outbound::sqlite::SqliteConnector;
use poolbench::application::{PoolObserver, SimulationRunner};
use poolbench::domain::{StatSnapshot, TrialParameters, TrialResult};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Runner over private in-memory SQLite databases.
pub fn sqlite_runner(backend_limit: Option<u32>) -> SimulationRunner {
    SimulationRunner::new(
        Arc::new(SqliteConnector::default().with_backend_limit(backend_limit)),
        PoolObserver::new(Duration::from_millis(5)),
    )
}

/// Run one trial to completion and return its closing statistics.
pub async fn run_sqlite(params: &TrialParameters, backend_limit: Option<u32>) -> (TrialResult, StatSnapshot) {
    let result = sqlite_runner(backend_limit)
        .run_trial(params, &CancellationToken::new())
        .await
        .expect("trial should run");
    let snapshot = result.final_snapshot.expect("stats should be available");
    (result, snapshot)
}

/// Write `contents` to `poolbench.toml` in a fresh temp dir.
pub fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("poolbench.toml");
    std::fs::write(&path, contents).expect("write temp config");
    (dir, path)
}
