//! Load generation against the pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, warn, Instrument};

use crate::domain::{OperationTally, Workload};
use crate::error::OperationError;
use crate::port::outbound::pool::PoolHandle;

/// Runs `concurrency` workers, each issuing `ops_per_worker` sequential
/// operations.
#[derive(Debug, Clone, Copy)]
pub struct WorkerGroup {
    concurrency: usize,
    ops_per_worker: usize,
}

/// Outcome counters shared by the workers of one group.
#[derive(Debug, Default)]
struct SharedTally {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl SharedTally {
    fn snapshot(&self) -> OperationTally {
        OperationTally {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl WorkerGroup {
    pub fn new(concurrency: usize, ops_per_worker: usize) -> Self {
        Self {
            concurrency,
            ops_per_worker,
        }
    }

    pub fn total_operations(&self) -> u64 {
        (self.concurrency as u64).saturating_mul(self.ops_per_worker as u64)
    }

    /// Run every worker to completion.
    ///
    /// Returns only once all workers have finished. Failed operations are
    /// logged and counted; they never stop a worker. Operations of a worker
    /// task that panicked are counted as failed.
    pub async fn run(
        &self,
        pool: Arc<dyn PoolHandle>,
        workload: Arc<Workload>,
        cancel: CancellationToken,
    ) -> OperationTally {
        let tally = Arc::new(SharedTally::default());
        let mut workers = JoinSet::new();

        for worker in 0..self.concurrency {
            workers.spawn(
                run_worker(
                    worker,
                    self.ops_per_worker,
                    Arc::clone(&pool),
                    Arc::clone(&workload),
                    cancel.clone(),
                    Arc::clone(&tally),
                )
                .in_current_span()
                .with_current_subscriber(),
            );
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task failed");
            }
        }

        let mut result = tally.snapshot();
        let unsettled = self.total_operations().saturating_sub(result.total());
        if unsettled > 0 {
            warn!(unsettled, "Operations lost with failed workers, counting as failed");
            result.failed += unsettled;
        }
        result
    }
}

async fn run_worker(
    worker: usize,
    ops: usize,
    pool: Arc<dyn PoolHandle>,
    workload: Arc<Workload>,
    cancel: CancellationToken,
    tally: Arc<SharedTally>,
) {
    for iteration in 0..ops {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(OperationError::Cancelled),
            result = pool.execute(&workload) => result,
        };

        match outcome {
            Ok(()) => {
                tally.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(OperationError::Cancelled) => {
                let remaining = (ops - iteration) as u64;
                tally.failed.fetch_add(remaining, Ordering::Relaxed);
                warn!(worker, iteration, remaining, "Worker cancelled");
                return;
            }
            Err(e) => {
                tally.failed.fetch_add(1, Ordering::Relaxed);
                warn!(worker, iteration, error = %e, "Operation failed");
            }
        }
    }
    debug!(worker, ops, "Worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::pool::ScriptedPool;

    #[tokio::test]
    async fn every_operation_is_attempted() {
        let pool = Arc::new(ScriptedPool::new(4));
        let tally = WorkerGroup::new(5, 7)
            .run(
                pool.clone(),
                Arc::new(Workload::default()),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(tally.succeeded, 35);
        assert_eq!(tally.failed, 0);
        assert_eq!(pool.executed(), 35);
    }

    #[tokio::test]
    async fn failures_do_not_stop_workers() {
        let pool = Arc::new(ScriptedPool::new(4).fail_every(3));
        let tally = WorkerGroup::new(2, 6)
            .run(
                pool.clone(),
                Arc::new(Workload::default()),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(tally.total(), 12);
        assert_eq!(tally.failed, 4);
        assert_eq!(pool.executed(), 12);
    }

    #[tokio::test]
    async fn cancelled_group_counts_remaining_as_failed() {
        let pool = Arc::new(ScriptedPool::new(4));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let tally = WorkerGroup::new(3, 4)
            .run(pool.clone(), Arc::new(Workload::default()), cancel)
            .await;

        assert_eq!(tally.succeeded, 0);
        assert_eq!(tally.failed, 12);
        assert_eq!(pool.executed(), 0);
    }

    #[tokio::test]
    async fn zero_operations_completes_immediately() {
        let pool = Arc::new(ScriptedPool::new(1));
        let tally = WorkerGroup::new(3, 0)
            .run(pool, Arc::new(Workload::default()), CancellationToken::new())
            .await;
        assert_eq!(tally.total(), 0);
    }

    #[tokio::test]
    async fn panicking_worker_counts_lost_operations_as_failed() {
        let pool = Arc::new(ScriptedPool::new(2).panic_on_attempt(3));
        let tally = WorkerGroup::new(2, 5)
            .run(
                pool.clone(),
                Arc::new(Workload::default()),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(tally.total(), 10);
        assert!(tally.failed >= 1);
        // The panicked attempt never returned, so it is not a success.
        assert_eq!(tally.succeeded, pool.executed() - 1);
    }
}
