//! Logging configuration and subscriber construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt as layer_fmt, EnvFilter, Layer, Registry};

use crate::error::{ConfigError, Error, Result};

/// Line format of every log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (pretty, compact, json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

/// Where log lines go: `"stdout"`, `"stderr"`, or a file path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum LogDestination {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl From<String> for LogDestination {
    fn from(value: String) -> Self {
        match value.as_str() {
            "stdout" => Self::Stdout,
            "stderr" => Self::Stderr,
            _ => Self::File(PathBuf::from(value)),
        }
    }
}

impl fmt::Display for LogDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_destinations")]
    pub destinations: Vec<LogDestination>,
}

fn default_level() -> String {
    "info".into()
}

fn default_destinations() -> Vec<LogDestination> {
    vec![LogDestination::Stderr]
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            destinations: default_destinations(),
        }
    }
}

/// Keeps file writers flushing. Pending lines are written when dropped.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LogGuard {
    _workers: Vec<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

impl LoggingConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        EnvFilter::try_new(&self.level).map_err(|e| ConfigError::InvalidValue {
            field: "logging.level",
            reason: e.to_string(),
        })?;
        if self.destinations.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.destinations",
                reason: "at least one destination is required".into(),
            });
        }
        Ok(())
    }

    /// Build the subscriber for this configuration.
    ///
    /// `RUST_LOG`, when set, replaces the configured level. The caller
    /// installs the returned [`Dispatch`] and keeps the guard alive for as
    /// long as it logs.
    pub fn build(&self) -> Result<(Dispatch, LogGuard)> {
        self.validate()?;
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| Error::Logging(e.to_string()))?;

        let mut layers: Vec<BoxedLayer> = Vec::with_capacity(self.destinations.len());
        let mut guard = LogGuard::default();

        for destination in &self.destinations {
            let layer = match destination {
                LogDestination::Stdout => format_layer(self.format, std::io::stdout, true),
                LogDestination::Stderr => format_layer(self.format, std::io::stderr, true),
                LogDestination::File(path) => {
                    let (writer, worker) = tracing_appender::non_blocking(file_appender(path)?);
                    guard._workers.push(worker);
                    format_layer(self.format, writer, false)
                }
            };
            layers.push(layer);
        }

        let subscriber = tracing_subscriber::registry().with(layers).with(filter);
        Ok((Dispatch::new(subscriber), guard))
    }
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = layer_fmt::layer().with_writer(writer).with_target(true);
    match format {
        LogFormat::Pretty => layer.pretty().with_ansi(ansi).boxed(),
        LogFormat::Compact => layer.compact().with_ansi(ansi).boxed(),
        LogFormat::Json => layer.json().with_ansi(false).boxed(),
    }
}

fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Logging(format!("invalid log file path: {}", path.display())))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| Error::Logging(e.to_string()))
}
