//! Pool limits applied to the external pool for one trial.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

/// Default time an operation waits for a connection slot.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// How many released connections the pool may keep idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleRetention {
    /// Every released connection is closed (`max_idle = -1`).
    Disabled,
    /// Keep at most this many idle connections.
    Limit(u32),
}

impl IdleRetention {
    /// Interpret the conventional integer setting, where any negative value
    /// disables retention.
    pub fn from_setting(value: i64) -> Self {
        if value < 0 {
            Self::Disabled
        } else {
            Self::Limit(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }

    /// Integer form, `-1` when disabled.
    pub fn as_setting(self) -> i64 {
        match self {
            Self::Disabled => -1,
            Self::Limit(n) => i64::from(n),
        }
    }

    /// Whether a connection released while `idle` connections already sit in
    /// the pool must be closed instead of retained.
    pub fn rejects(self, idle: u32) -> bool {
        match self {
            Self::Disabled => true,
            Self::Limit(n) => idle >= n,
        }
    }
}

impl fmt::Display for IdleRetention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::Limit(n) => write!(f, "{n}"),
        }
    }
}

/// Limits handed to the pool when a trial opens it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_open: u32,
    pub max_idle: IdleRetention,
    /// `None` keeps connections regardless of age.
    pub max_lifetime: Option<Duration>,
    /// `None` keeps idle connections regardless of idle time.
    pub max_idle_time: Option<Duration>,
    pub acquire_timeout: Duration,
}

impl PoolConfig {
    /// Build a config from the conventional integer settings.
    ///
    /// Zero durations mean "no limit".
    pub fn new(
        max_open: u32,
        max_idle: i64,
        max_lifetime: Duration,
        max_idle_time: Duration,
    ) -> Self {
        Self {
            max_open,
            max_idle: IdleRetention::from_setting(max_idle),
            max_lifetime: non_zero(max_lifetime),
            max_idle_time: non_zero(max_idle_time),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Check the limits the pool cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_open == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_open",
                reason: "must be > 0".into(),
            });
        }
        if self.acquire_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "acquire_timeout_ms",
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Retention actually applied: an idle limit above `max_open` is capped
    /// to `max_open`.
    pub fn effective_max_idle(&self) -> IdleRetention {
        match self.max_idle {
            IdleRetention::Limit(n) if n > self.max_open => IdleRetention::Limit(self.max_open),
            other => other,
        }
    }

    /// Whether the pool retains idle connections at all.
    pub fn pooling_enabled(&self) -> bool {
        !matches!(self.max_idle, IdleRetention::Disabled)
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}
