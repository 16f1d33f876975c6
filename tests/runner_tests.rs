//! Trial completion and cancellation with in-process pools.

use std::sync::Arc;
use std::time::Duration;

use poolbench::application::{Harness, HarnessEvent, PlannedTrial, PoolObserver, SimulationRunner};
use poolbench::testkit::config::trial;
use poolbench::testkit::pool::{ScriptedConnector, ScriptedPool};
use tokio_util::sync::CancellationToken;

fn delayed(delay: Duration) -> ScriptedConnector {
    ScriptedConnector::new(move |c| ScriptedPool::new(c.max_open).with_delay(delay))
}

#[tokio::test]
async fn trial_completes_for_any_poll_interval() {
    for interval in [1, 7, 50, 500] {
        let connector = delayed(Duration::from_millis(1));
        let runner = SimulationRunner::new(
            Arc::new(connector.clone()),
            PoolObserver::new(Duration::from_millis(interval)),
        );

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            runner.run_trial(&trial("interval", 4, 5, 2, 2), &CancellationToken::new()),
        )
        .await
        .expect("trial should finish")
        .unwrap();

        assert_eq!(result.operations.succeeded, 20, "interval {interval}ms");
        assert_eq!(connector.last_pool().unwrap().executed(), 20);
    }
}

#[tokio::test]
async fn contention_shows_up_as_waits() {
    let connector = delayed(Duration::from_millis(5));
    let runner = SimulationRunner::new(
        Arc::new(connector),
        PoolObserver::new(Duration::from_millis(2)),
    );

    let result = runner
        .run_trial(&trial("contended", 8, 3, 2, 2), &CancellationToken::new())
        .await
        .unwrap();

    let stats = result.final_snapshot.unwrap();
    assert!(stats.wait_count > 0);
    assert_eq!(stats.in_use_connections, 0);
    assert!(stats.open_connections <= 2);
}

#[tokio::test]
async fn cancellation_ends_trial_early() {
    let runner = SimulationRunner::new(
        Arc::new(delayed(Duration::from_millis(20))),
        PoolObserver::new(Duration::from_millis(5)),
    );
    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        runner.run_trial(&trial("cancelled", 2, 1000, 2, 2), &cancel),
    )
    .await
    .expect("cancelled trial should finish")
    .unwrap();
    canceller.await.unwrap();

    assert_eq!(result.operations.total(), 2000);
    assert!(result.operations.failed > 0);
    assert!(result.operations.succeeded < 2000);
}

#[tokio::test]
async fn harness_reports_progress_for_each_trial() {
    let plan: Vec<PlannedTrial> = (0..3)
        .map(|i| {
            PlannedTrial::new(
                trial(&format!("trial-{i}"), 2, 2, 2, 2),
                Arc::new(delayed(Duration::ZERO)),
            )
        })
        .collect();

    let mut events = Vec::new();
    let results = Harness::new(PoolObserver::new(Duration::from_millis(1)))
        .run_all(&plan, &CancellationToken::new(), |event| {
            events.push(match event {
                HarnessEvent::Started { index, .. } => format!("start {index}"),
                HarnessEvent::Finished { index, .. } => format!("finish {index}"),
            });
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(
        events,
        ["start 0", "finish 0", "start 1", "finish 1", "start 2", "finish 2"]
    );
}
