//! Handler for the `run` command.

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::inbound::cli::output;
use crate::application::{HarnessEvent, PlannedTrial};
use crate::domain::{PoolConfig, TrialParameters, TrialResult, Workload};
use crate::error::{ConfigError, Result};
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::scenarios;
use crate::infrastructure::config::settings::HarnessConfig;

/// Execute the run command.
pub async fn execute(args: &RunArgs, mut config: HarnessConfig) -> Result<()> {
    apply_overrides(args, &mut config)?;
    let plan = build_plan(args, &config)?;
    let harness = bootstrap::harness(&config.observer);

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Backend", &config.backend.url);
    if let Some(limit) = config.backend.connection_limit {
        output::field("Backend limit", limit);
    }
    output::field("Poll interval", format!("{}ms", config.observer.poll_interval_ms));
    output::field("Trials", plan.len());

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling");
                cancel.cancel();
            }
        }
    });

    let mut spinner = None;
    let outcome = harness
        .run_all(&plan, &cancel, |event| match event {
            HarnessEvent::Started {
                index,
                total,
                params,
            } => {
                output::section(&format!("Trial {}/{}: {}", index + 1, total, params.name));
                print_parameters(params);
                spinner = Some(output::spinner(&format!("Running {}", params.name)));
            }
            HarnessEvent::Finished { result, .. } => {
                if let Some(pb) = spinner.take() {
                    output::spinner_success(
                        &pb,
                        &format!("Completed in {}", format_elapsed(result.elapsed)),
                    );
                }
                print_result(result);
            }
        })
        .await;
    interrupt.abort();

    match outcome {
        Ok(results) => {
            print_summary(&results);
            if cancel.is_cancelled() {
                output::warning("Cancelled; remaining trials were skipped");
            }
            Ok(())
        }
        Err(e) => {
            if let Some(pb) = spinner.take() {
                output::spinner_fail(&pb, "Trial could not start");
            }
            Err(e)
        }
    }
}

fn apply_overrides(args: &RunArgs, config: &mut HarnessConfig) -> Result<()> {
    if let Some(url) = &args.database_url {
        config.backend.url.clone_from(url);
    }
    if args.backend_limit.is_some() {
        config.backend.connection_limit = args.backend_limit;
    }
    if let Some(ms) = args.poll_interval_ms {
        config.observer.poll_interval_ms = ms;
    }
    config.validate()?;
    Ok(())
}

/// Trials selected by the flags, in the order they run.
fn build_plan(args: &RunArgs, config: &HarnessConfig) -> Result<Vec<PlannedTrial>> {
    if args.all {
        return Ok(bootstrap::plan_scenarios(scenarios::builtin(), &config.backend));
    }

    if !args.scenarios.is_empty() {
        let selected = args
            .scenarios
            .iter()
            .map(|name| {
                scenarios::find(name).ok_or_else(|| ConfigError::InvalidValue {
                    field: "scenario",
                    reason: format!("unknown scenario '{name}' (see `poolbench scenarios`)"),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        return Ok(bootstrap::plan_scenarios(selected, &config.backend));
    }

    if !config.trials.is_empty() {
        return Ok(bootstrap::plan_config(config));
    }

    let params = single_trial(args);
    params.validate()?;
    Ok(vec![bootstrap::plan_trial(params, &config.backend, None)])
}

fn single_trial(args: &RunArgs) -> TrialParameters {
    let pool = PoolConfig::new(
        args.max_open,
        args.max_idle,
        Duration::from_secs(args.max_lifetime_secs),
        Duration::from_secs(args.max_idle_time_secs),
    )
    .with_acquire_timeout(Duration::from_millis(args.acquire_timeout_ms));

    TrialParameters::new(args.name.clone(), args.concurrency, args.ops, pool).with_workload(
        Workload::new(args.query.clone(), Duration::from_millis(args.hold_ms)),
    )
}

fn print_parameters(params: &TrialParameters) {
    output::field("Concurrency", params.concurrency);
    output::field("Ops/worker", params.ops_per_worker);
    output::field("Max open", params.pool.max_open);
    output::field("Max idle", params.pool.max_idle);
    if let Some(lifetime) = params.pool.max_lifetime {
        output::field("Max lifetime", format!("{}s", lifetime.as_secs()));
    }
    if let Some(idle_time) = params.pool.max_idle_time {
        output::field("Max idle time", format!("{}s", idle_time.as_secs()));
    }
    if !params.workload.hold.is_zero() {
        output::field("Hold", format!("{}ms", params.workload.hold.as_millis()));
    }
}

fn print_result(result: &TrialResult) {
    let ops = result.operations;
    output::record(
        "trial",
        json!({
            "name": result.name,
            "started_at": result.started_at.to_rfc3339(),
            "elapsed_ms": result.elapsed.as_millis() as u64,
            "succeeded": ops.succeeded,
            "failed": ops.failed,
            "regime": result.regime(),
            "stats": result.final_snapshot.map(|s| json!({
                "max_open": s.max_open,
                "open": s.open_connections,
                "idle": s.idle_connections,
                "in_use": s.in_use_connections,
                "max_idle_closed": s.max_idle_closed,
                "max_lifetime_closed": s.max_lifetime_closed,
                "max_idle_time_closed": s.max_idle_time_closed,
                "wait_count": s.wait_count,
                "wait_duration_us": s.wait_duration.as_micros() as u64,
            })),
        }),
    );
    if output::is_json() {
        return;
    }

    output::field(
        "Operations",
        format!("{} ok, {} failed", ops.succeeded, ops.failed),
    );
    match &result.final_snapshot {
        Some(s) => {
            output::field("Regime", output::highlight(s.regime()));
            output::field(
                "Connections",
                format!(
                    "{} open, {} idle, {} in use",
                    s.open_connections, s.idle_connections, s.in_use_connections
                ),
            );
            output::field(
                "Closed",
                format!(
                    "{} idle limit, {} lifetime, {} idle time",
                    s.max_idle_closed, s.max_lifetime_closed, s.max_idle_time_closed
                ),
            );
            output::field(
                "Waits",
                format!("{} ({})", s.wait_count, format_elapsed(s.wait_duration)),
            );
        }
        None => output::warning("Pool statistics unavailable"),
    }
}

const SUMMARY_COLUMNS: &[(&str, usize)] = &[
    ("trial", 16),
    ("elapsed", 10),
    ("ok", 7),
    ("failed", 7),
    ("idle closed", 11),
    ("waits", 8),
    ("regime", 10),
];

fn print_summary(results: &[TrialResult]) {
    if results.len() < 2 {
        return;
    }
    let widths: Vec<usize> = SUMMARY_COLUMNS.iter().map(|(_, w)| *w).collect();

    output::section("Summary");
    output::table_header(SUMMARY_COLUMNS);
    output::table_separator(&widths);
    for r in results {
        let (closed, waits) = r
            .final_snapshot
            .map(|s| (s.max_idle_closed.to_string(), s.wait_count.to_string()))
            .unwrap_or_else(|| ("-".into(), "-".into()));
        let regime = r
            .regime()
            .map_or_else(|| output::muted("unavailable"), |g| g.to_string());
        output::table_row(
            &[
                r.name.clone(),
                format_elapsed(r.elapsed),
                r.operations.succeeded.to_string(),
                r.operations.failed.to_string(),
                closed,
                waits,
                regime,
            ],
            &widths,
        );
    }
}

fn format_elapsed(d: Duration) -> String {
    if d >= Duration::from_secs(1) {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        format!("{}ms", d.as_millis())
    }
}
