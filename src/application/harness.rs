//! Sequential execution of a set of trials.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::observer::PoolObserver;
use super::runner::SimulationRunner;
use crate::domain::{TrialParameters, TrialResult};
use crate::error::Result;
use crate::port::outbound::pool::PoolConnector;

/// One trial and the connector that opens its pool.
#[derive(Clone)]
pub struct PlannedTrial {
    pub params: TrialParameters,
    pub connector: Arc<dyn PoolConnector>,
}

impl PlannedTrial {
    pub fn new(params: TrialParameters, connector: Arc<dyn PoolConnector>) -> Self {
        Self { params, connector }
    }
}

/// Progress reported while the harness runs.
#[derive(Debug)]
pub enum HarnessEvent<'a> {
    Started {
        index: usize,
        total: usize,
        params: &'a TrialParameters,
    },
    Finished {
        index: usize,
        total: usize,
        result: &'a TrialResult,
    },
}

/// Runs planned trials one after another.
#[derive(Debug, Clone, Copy, Default)]
pub struct Harness {
    observer: PoolObserver,
}

impl Harness {
    pub fn new(observer: PoolObserver) -> Self {
        Self { observer }
    }

    /// Run every trial in order.
    ///
    /// Stops at the first trial that cannot start (invalid parameters or pool
    /// setup failure) and returns that error. Cancellation skips the trials
    /// not yet started; results gathered so far are returned.
    pub async fn run_all(
        &self,
        plan: &[PlannedTrial],
        cancel: &CancellationToken,
        mut on_event: impl FnMut(HarnessEvent<'_>),
    ) -> Result<Vec<TrialResult>> {
        let total = plan.len();
        let mut results = Vec::with_capacity(total);

        for (index, trial) in plan.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    completed = results.len(),
                    skipped = total - index,
                    "Harness cancelled, skipping remaining trials"
                );
                break;
            }

            on_event(HarnessEvent::Started {
                index,
                total,
                params: &trial.params,
            });

            let runner = SimulationRunner::new(Arc::clone(&trial.connector), self.observer);
            let result = runner.run_trial(&trial.params, cancel).await?;

            on_event(HarnessEvent::Finished {
                index,
                total,
                result: &result,
            });
            results.push(result);
        }

        info!(trials = results.len(), "Harness finished");
        Ok(results)
    }
}
