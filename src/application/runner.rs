//! One trial end to end: open the pool, drive it, observe it, summarize.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{error, info, info_span, warn, Instrument};

use super::observer::{ObserverOutcome, PoolObserver};
use super::worker::WorkerGroup;
use crate::domain::{StatSnapshot, TrialParameters, TrialResult};
use crate::error::{Result, StatsError};
use crate::port::outbound::pool::{PoolConnector, PoolHandle};

/// Runs trials against pools opened by a [`PoolConnector`].
pub struct SimulationRunner {
    connector: Arc<dyn PoolConnector>,
    observer: PoolObserver,
}

impl SimulationRunner {
    pub fn new(connector: Arc<dyn PoolConnector>, observer: PoolObserver) -> Self {
        Self {
            connector,
            observer,
        }
    }

    /// Run one trial to completion.
    ///
    /// Waits for both the worker group and the observer, however far apart
    /// they finish.
    ///
    /// # Errors
    /// Returns an error if the parameters are invalid or the pool cannot be
    /// opened. Failures inside the trial are logged, never returned.
    pub async fn run_trial(
        &self,
        params: &TrialParameters,
        cancel: &CancellationToken,
    ) -> Result<TrialResult> {
        params.validate()?;
        let span = info_span!("trial", name = %params.name);
        self.run_validated(params, cancel).instrument(span).await
    }

    async fn run_validated(
        &self,
        params: &TrialParameters,
        cancel: &CancellationToken,
    ) -> Result<TrialResult> {
        let pool_config = &params.pool;
        info!(
            backend = %self.connector.describe(),
            concurrency = params.concurrency,
            ops_per_worker = params.ops_per_worker,
            max_open = pool_config.max_open,
            max_idle = %pool_config.max_idle,
            max_lifetime_ms = pool_config.max_lifetime.map(|d| d.as_millis() as u64),
            max_idle_time_ms = pool_config.max_idle_time.map(|d| d.as_millis() as u64),
            query = %params.workload.query,
            hold_ms = params.workload.hold.as_millis() as u64,
            "Starting trial"
        );

        let pool = self.connector.connect(pool_config).await.map_err(|e| {
            error!(error = %e, "Pool setup failed");
            e
        })?;

        let started_at = Utc::now();
        let started = Instant::now();

        let workers_done = CancellationToken::new();
        let observer = self.observer;
        let (observed_pool, done, observer_cancel) = (
            Arc::clone(&pool),
            workers_done.clone(),
            cancel.child_token(),
        );
        let observer_task = tokio::spawn(
            async move {
                observer
                    .observe(observed_pool, done, observer_cancel)
                    .await
            }
            .in_current_span()
            .with_current_subscriber(),
        );

        let group = WorkerGroup::new(params.concurrency, params.ops_per_worker);
        let workers = async {
            let tally = group
                .run(
                    Arc::clone(&pool),
                    Arc::new(params.workload.clone()),
                    cancel.child_token(),
                )
                .await;
            workers_done.cancel();
            tally
        };

        let (operations, observed) = tokio::join!(workers, observer_task);
        let elapsed = started.elapsed();

        let outcome = observed.unwrap_or_else(|e| {
            error!(error = %e, "Observer task failed");
            ObserverOutcome::StatsUnavailable(StatsError::Unavailable(e.to_string()))
        });
        let final_snapshot = closing_snapshot(pool.as_ref(), &outcome);

        let result = TrialResult {
            name: params.name.clone(),
            started_at,
            elapsed,
            final_snapshot,
            operations,
        };
        log_summary(&result);
        Ok(result)
    }
}

/// Last statistics for the result: a fresh read once everything finished,
/// unless the observer already found the stats unavailable.
fn closing_snapshot(pool: &dyn PoolHandle, outcome: &ObserverOutcome) -> Option<StatSnapshot> {
    if !outcome.stats_available() {
        return None;
    }
    match pool.stats() {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(error = %e, "Final stats read failed");
            outcome.last_snapshot().copied()
        }
    }
}

fn log_summary(result: &TrialResult) {
    let elapsed_ms = result.elapsed.as_millis() as u64;
    let ops = result.operations;
    match &result.final_snapshot {
        Some(s) => info!(
            elapsed_ms,
            succeeded = ops.succeeded,
            failed = ops.failed,
            open = s.open_connections,
            idle = s.idle_connections,
            in_use = s.in_use_connections,
            max_idle_closed = s.max_idle_closed,
            max_lifetime_closed = s.max_lifetime_closed,
            max_idle_time_closed = s.max_idle_time_closed,
            wait_count = s.wait_count,
            wait_duration_us = s.wait_duration.as_micros() as u64,
            regime = %s.regime(),
            "Trial complete"
        ),
        None => warn!(
            elapsed_ms,
            succeeded = ops.succeeded,
            failed = ops.failed,
            "Trial complete, stats unavailable"
        ),
    }
}
