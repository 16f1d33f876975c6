//! Built-in trial scenarios.

use std::time::Duration;

use crate::domain::{PoolConfig, TrialParameters, Workload};

/// A named, ready-to-run trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub description: &'static str,
    pub params: TrialParameters,
    /// Backend connection cap the scenario needs, if any.
    pub backend_limit: Option<u32>,
}

impl Scenario {
    pub fn name(&self) -> &str {
        &self.params.name
    }
}

fn scenario(
    name: &str,
    description: &'static str,
    (concurrency, ops_per_worker): (usize, usize),
    (max_open, max_idle): (u32, i64),
) -> Scenario {
    Scenario {
        description,
        params: TrialParameters::new(
            name,
            concurrency,
            ops_per_worker,
            PoolConfig::new(max_open, max_idle, Duration::ZERO, Duration::ZERO),
        ),
        backend_limit: None,
    }
}

/// Every built-in scenario, in the order `run --all` executes them.
pub fn builtin() -> Vec<Scenario> {
    let mut capped = scenario(
        "scenario-a",
        "more workers than the backend accepts; excess connects fail, trial still completes",
        (100, 20),
        (51, 51),
    );
    capped.backend_limit = Some(50);
    capped.params.workload = Workload::new("SELECT 1", Duration::from_millis(50));

    let mut contention = scenario(
        "contention",
        "100 workers share 20 connections with lifetime and idle-time limits",
        (100, 100),
        (20, 20),
    );
    contention.params.pool = PoolConfig::new(
        20,
        20,
        Duration::from_secs(180),
        Duration::from_secs(60),
    );
    contention.params.workload = Workload::new("SELECT 1", Duration::from_millis(1));

    vec![
        scenario(
            "without-pool",
            "idle retention disabled; every released connection is closed",
            (1, 20),
            (10, -1),
        ),
        scenario(
            "with-pool",
            "one idle connection retained and reused",
            (1, 20),
            (10, 1),
        ),
        capped,
        scenario(
            "scenario-b",
            "fewer workers than max_open; full reuse, no waits",
            (20, 20),
            (30, 30),
        ),
        contention,
    ]
}

/// Look up a built-in scenario by name.
pub fn find(name: &str) -> Option<Scenario> {
    builtin().into_iter().find(|s| s.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IdleRetention;

    #[test]
    fn builtin_scenarios_are_valid() {
        for s in builtin() {
            s.params.validate().unwrap_or_else(|e| panic!("{}: {e}", s.name()));
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = builtin().iter().map(|s| s.name().to_owned()).collect();
        let len = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), len);
    }

    #[test]
    fn scenario_a_caps_the_backend_below_max_open() {
        let a = find("scenario-a").unwrap();
        assert_eq!(a.params.concurrency, 100);
        assert_eq!(a.params.ops_per_worker, 20);
        assert_eq!(a.params.pool.max_open, 51);
        assert_eq!(a.backend_limit, Some(50));
        // Connections are held long enough for demand to pass the cap.
        assert!(a.params.workload.hold >= Duration::from_millis(20));
    }

    #[test]
    fn without_pool_disables_retention() {
        let s = find("without-pool").unwrap();
        assert_eq!(s.params.pool.max_idle, IdleRetention::Disabled);
        assert!(find("missing").is_none());
    }
}
