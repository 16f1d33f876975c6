//! Handler for the `config` command group.

use std::path::Path;

use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::infrastructure::config::settings::HarnessConfig;

/// Execute `config show`.
pub fn execute_show(path: &Path) -> Result<()> {
    let config = HarnessConfig::load(path)?;

    output::section("Logging");
    output::field("Level", &config.logging.level);
    output::field("Format", config.logging.format);
    let destinations: Vec<String> = config
        .logging
        .destinations
        .iter()
        .map(ToString::to_string)
        .collect();
    output::field("Destinations", destinations.join(", "));

    output::section("Backend");
    output::field("URL", &config.backend.url);
    output::field(
        "Connection limit",
        config
            .backend
            .connection_limit
            .map_or_else(|| "unlimited".to_string(), |l| l.to_string()),
    );

    output::section("Observer");
    output::field("Poll interval", format!("{}ms", config.observer.poll_interval_ms));

    output::section("Trials");
    if config.trials.is_empty() {
        output::note("(none; `run` falls back to its flags)");
    }
    for trial in config.trial_parameters() {
        let pool = &trial.pool;
        output::field(
            &trial.name,
            format!(
                "{} workers x {} ops, max_open {}, max_idle {}, acquire timeout {}ms",
                trial.concurrency,
                trial.ops_per_worker,
                pool.max_open,
                pool.effective_max_idle(),
                pool.acquire_timeout.as_millis()
            ),
        );
    }
    Ok(())
}

/// Execute `config validate`.
pub fn execute_validate(path: &Path) -> Result<()> {
    output::section("Config Validation");
    output::field("Path", path.display());
    let config = HarnessConfig::load(path)?;
    output::success("Config file is valid");
    output::field("Trials", config.trials.len());

    for trial in config.trial_parameters() {
        if trial.pool.effective_max_idle() != trial.pool.max_idle {
            output::warning(&format!(
                "trial '{}': max_idle {} exceeds max_open {}, will be capped",
                trial.name, trial.pool.max_idle, trial.pool.max_open
            ));
        }
    }

    output::field("Next", format!("poolbench run -c {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("poolbench.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn validate_accepts_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[[trial]]\nname = \"t\"\nconcurrency = 2\nops_per_worker = 2\n[trial.pool]\nmax_open = 2\nmax_idle = 9",
        );
        assert!(execute_validate(&path).is_ok());
    }

    #[test]
    fn validate_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[observer]\npoll_interval_ms = 0");
        assert!(execute_validate(&path).is_err());
    }

    #[test]
    fn show_reads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");
        assert!(execute_show(&path).is_ok());
    }

    #[test]
    fn show_missing_file_fails() {
        assert!(execute_show(Path::new("/nonexistent/poolbench.toml")).is_err());
    }
}
