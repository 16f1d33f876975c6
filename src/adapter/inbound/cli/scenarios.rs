//! Handler for the `scenarios` command.

use std::path::Path;

use crate::adapter::inbound::cli::output;
use crate::domain::TrialParameters;
use crate::error::Result;
use crate::infrastructure::config::scenarios;
use crate::infrastructure::config::settings::HarnessConfig;

const COLUMNS: &[(&str, usize)] = &[
    ("name", 14),
    ("workers", 7),
    ("ops", 5),
    ("max open", 8),
    ("max idle", 8),
    ("limit", 5),
];

/// Execute `scenarios`.
pub fn execute(config: Option<&Path>) -> Result<()> {
    let widths: Vec<usize> = COLUMNS.iter().map(|(_, w)| *w).collect();

    output::section("Built-in scenarios");
    output::table_header(COLUMNS);
    output::table_separator(&widths);
    for s in scenarios::builtin() {
        output::table_row(&row(&s.params, s.backend_limit), &widths);
        output::note(s.description);
    }

    if let Some(path) = config {
        let config = HarnessConfig::load(path)?;
        output::section(&format!("Trials in {}", path.display()));
        if config.trials.is_empty() {
            output::note("(none)");
        } else {
            output::table_header(COLUMNS);
            output::table_separator(&widths);
            for trial in &config.trials {
                let limit = trial.backend_limit.or(config.backend.connection_limit);
                output::table_row(&row(&trial.to_parameters(), limit), &widths);
            }
        }
    }

    output::note("Run one with: poolbench run --scenario <name>");
    Ok(())
}

fn row(params: &TrialParameters, backend_limit: Option<u32>) -> Vec<String> {
    vec![
        params.name.clone(),
        params.concurrency.to_string(),
        params.ops_per_worker.to_string(),
        params.pool.max_open.to_string(),
        params.pool.max_idle.as_setting().to_string(),
        backend_limit.map_or_else(|| output::muted("-"), |l| l.to_string()),
    ]
}
