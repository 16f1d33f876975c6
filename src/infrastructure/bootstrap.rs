//! Composition root: turns configuration into planned trials.

use std::sync::Arc;

use crate::application::{Harness, PlannedTrial, PoolObserver};
use crate::domain::TrialParameters;
use crate::infrastructure::config::scenarios::Scenario;
use crate::infrastructure::config::settings::{BackendConfig, HarnessConfig, ObserverConfig};

/// Pair a trial with a SQLite connector for `backend`.
pub fn plan_trial(
    params: TrialParameters,
    backend: &BackendConfig,
    backend_limit: Option<u32>,
) -> PlannedTrial {
    PlannedTrial::new(params, Arc::new(backend.connector(backend_limit)))
}

/// Plan every `[[trial]]` of a config file.
pub fn plan_config(config: &HarnessConfig) -> Vec<PlannedTrial> {
    config
        .trials
        .iter()
        .map(|t| plan_trial(t.to_parameters(), &config.backend, t.backend_limit))
        .collect()
}

/// Plan built-in scenarios against `backend`.
pub fn plan_scenarios(scenarios: Vec<Scenario>, backend: &BackendConfig) -> Vec<PlannedTrial> {
    scenarios
        .into_iter()
        .map(|s| plan_trial(s.params, backend, s.backend_limit))
        .collect()
}

pub fn harness(observer: &ObserverConfig) -> Harness {
    Harness::new(PoolObserver::new(observer.poll_interval()))
}
