//! Harness configuration loading and validation.
//!
//! A config file describes the backend, the observer and any number of
//! `[[trial]]` tables:
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "json"
//! destinations = ["stdout", "poolbench.log"]
//!
//! [backend]
//! url = ":memory:"
//! connection_limit = 50
//!
//! [observer]
//! poll_interval_ms = 100
//!
//! [[trial]]
//! name = "churn"
//! concurrency = 10
//! ops_per_worker = 20
//!
//! [trial.pool]
//! max_open = 10
//! max_idle = -1
//!
//! [trial.workload]
//! query = "SELECT 1"
//! hold_ms = 5
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::logging::LoggingConfig;
use crate::adapter::outbound::sqlite::{SqliteConnector, DEFAULT_DATABASE_URL};
use crate::application::DEFAULT_POLL_INTERVAL;
use crate::domain::{PoolConfig, TrialParameters, Workload, DEFAULT_ACQUIRE_TIMEOUT};
use crate::error::{ConfigError, Result};

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default, rename = "trial")]
    pub trials: Vec<TrialConfig>,
}

/// Database the pools connect to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Connections the backend accepts in total; unset means unlimited.
    #[serde(default)]
    pub connection_limit: Option<u32>,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.into()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            connection_limit: None,
        }
    }
}

impl BackendConfig {
    /// Connector for one trial; a trial-level limit replaces the backend's.
    pub fn connector(&self, trial_limit: Option<u32>) -> SqliteConnector {
        SqliteConnector::new(self.url.clone()).with_backend_limit(trial_limit.or(self.connection_limit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ObserverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// One `[[trial]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrialConfig {
    pub name: String,
    pub concurrency: usize,
    pub ops_per_worker: usize,
    /// Overrides `[backend].connection_limit` for this trial.
    #[serde(default)]
    pub backend_limit: Option<u32>,
    pub pool: PoolSettings,
    #[serde(default)]
    pub workload: WorkloadSettings,
}

/// Pool limits in their conventional integer form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PoolSettings {
    pub max_open: u32,
    /// Negative disables idle retention.
    pub max_idle: i64,
    /// Zero means no limit.
    #[serde(default)]
    pub max_lifetime_secs: u64,
    /// Zero means no limit.
    #[serde(default)]
    pub max_idle_time_secs: u64,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_acquire_timeout_ms() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT.as_millis() as u64
}

impl PoolSettings {
    pub fn to_pool_config(self) -> PoolConfig {
        PoolConfig::new(
            self.max_open,
            self.max_idle,
            Duration::from_secs(self.max_lifetime_secs),
            Duration::from_secs(self.max_idle_time_secs),
        )
        .with_acquire_timeout(Duration::from_millis(self.acquire_timeout_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkloadSettings {
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default)]
    pub hold_ms: u64,
}

fn default_query() -> String {
    Workload::default().query
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            query: default_query(),
            hold_ms: 0,
        }
    }
}

impl TrialConfig {
    pub fn to_parameters(&self) -> TrialParameters {
        TrialParameters::new(
            self.name.clone(),
            self.concurrency,
            self.ops_per_worker,
            self.pool.to_pool_config(),
        )
        .with_workload(Workload::new(
            self.workload.query.clone(),
            Duration::from_millis(self.workload.hold_ms),
        ))
    }
}

impl HarnessConfig {
    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.logging.validate()?;

        if self.backend.url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "backend.url",
            });
        }
        if self.backend.connection_limit == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "backend.connection_limit",
                reason: "must be > 0".into(),
            });
        }
        if self.observer.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "observer.poll_interval_ms",
                reason: "must be > 0".into(),
            });
        }

        for trial in &self.trials {
            if trial.name.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "trial.name",
                });
            }
            if trial.backend_limit == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "trial.backend_limit",
                    reason: format!("must be > 0 (trial '{}')", trial.name),
                });
            }
            trial.to_parameters().validate()?;
        }
        Ok(())
    }

    pub fn trial_parameters(&self) -> Vec<TrialParameters> {
        self.trials.iter().map(TrialConfig::to_parameters).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IdleRetention;
    use crate::error::Error;
    use crate::port::outbound::pool::PoolConnector;

    const FULL: &str = r#"
        [backend]
        url = "bench.db"
        connection_limit = 50

        [observer]
        poll_interval_ms = 20

        [[trial]]
        name = "churn"
        concurrency = 10
        ops_per_worker = 20

        [trial.pool]
        max_open = 10
        max_idle = -1
        max_lifetime_secs = 180
        max_idle_time_secs = 60

        [trial.workload]
        hold_ms = 5

        [[trial]]
        name = "capped"
        concurrency = 100
        ops_per_worker = 20
        backend_limit = 25

        [trial.pool]
        max_open = 51
        max_idle = 51
    "#;

    #[test]
    fn parses_trials_with_defaults() {
        let config = HarnessConfig::parse_toml(FULL).unwrap();
        assert_eq!(config.trials.len(), 2);
        assert_eq!(config.observer.poll_interval(), Duration::from_millis(20));

        let params = config.trial_parameters();
        let churn = &params[0];
        assert_eq!(churn.pool.max_idle, IdleRetention::Disabled);
        assert_eq!(churn.pool.max_lifetime, Some(Duration::from_secs(180)));
        assert_eq!(churn.pool.max_idle_time, Some(Duration::from_secs(60)));
        assert_eq!(churn.workload.query, "SELECT 1");
        assert_eq!(churn.workload.hold, Duration::from_millis(5));

        let capped = &params[1];
        assert_eq!(capped.pool.max_lifetime, None);
        assert_eq!(capped.pool.acquire_timeout, DEFAULT_ACQUIRE_TIMEOUT);
    }

    #[test]
    fn trial_backend_limit_overrides_backend() {
        let config = HarnessConfig::parse_toml(FULL).unwrap();
        let churn = config.backend.connector(config.trials[0].backend_limit);
        let capped = config.backend.connector(config.trials[1].backend_limit);
        assert_eq!(churn.describe(), "sqlite bench.db (backend limit 50)");
        assert_eq!(capped.describe(), "sqlite bench.db (backend limit 25)");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = HarnessConfig::parse_toml("").unwrap();
        assert!(config.trials.is_empty());
        assert_eq!(config.backend.url, ":memory:");
        assert_eq!(config.observer.poll_interval(), DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn zero_max_open_is_rejected() {
        let err = HarnessConfig::parse_toml(
            r#"
            [[trial]]
            name = "bad"
            concurrency = 1
            ops_per_worker = 1
            [trial.pool]
            max_open = 0
            max_idle = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue { field: "max_open", .. })
        ));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = HarnessConfig::parse_toml("[observer]\npoll_interval_ms = 0").unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "observer.poll_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn missing_pool_table_is_a_parse_error() {
        let err = HarnessConfig::parse_toml(
            r#"
            [[trial]]
            name = "no-pool"
            concurrency = 1
            ops_per_worker = 1
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let err = HarnessConfig::load("/nonexistent/poolbench.toml").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
    }
}
