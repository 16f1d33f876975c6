use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Pool handle could not be established; aborts a trial before any worker starts.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("failed to build pool: {0}")]
    Build(String),
}

/// Failure of a single acquire-execute-release cycle.
///
/// These never abort a trial; workers log them and move on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("failed to acquire connection: {0}")]
    Acquire(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation task failed: {0}")]
    Join(String),
}

/// The pool's statistics accessor could not be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    #[error("pool statistics unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_wraps_transparently() {
        let err: Error = ConfigError::InvalidValue {
            field: "max_open",
            reason: "must be > 0".into(),
        }
        .into();
        assert_eq!(err.to_string(), "invalid value for max_open: must be > 0");
    }

    #[test]
    fn setup_error_names_url() {
        let err: Error = SetupError::Connect {
            url: "/missing/db.sqlite".into(),
            reason: "unable to open database file".into(),
        }
        .into();
        assert!(err.to_string().contains("/missing/db.sqlite"));
        assert!(matches!(err, Error::Setup(_)));
    }
}
