//! Connector that opens SQLite pools for each trial.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::{IdleRetention, PoolConfig};
use crate::error::SetupError;
use crate::port::outbound::pool::{PoolConnector, PoolHandle};

use super::database::connection::{create_pool, ping};
use super::database::manager::PoolCounters;
use super::pool::SqlitePool;

/// Default database: a private in-memory database per connection.
pub const DEFAULT_DATABASE_URL: &str = ":memory:";

/// Opens [`SqlitePool`]s against one database URL.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    database_url: String,
    backend_limit: Option<u32>,
}

impl SqliteConnector {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            backend_limit: None,
        }
    }

    /// Refuse connections beyond `limit`, like a server's connection cap.
    #[must_use]
    pub fn with_backend_limit(mut self, limit: Option<u32>) -> Self {
        self.backend_limit = limit;
        self
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    fn open_blocking(&self, config: PoolConfig) -> Result<SqlitePool, SetupError> {
        ping(&self.database_url)?;

        if let (IdleRetention::Limit(requested), IdleRetention::Limit(applied)) =
            (config.max_idle, config.effective_max_idle())
        {
            if requested != applied {
                warn!(
                    requested,
                    applied,
                    max_open = config.max_open,
                    "max_idle exceeds max_open, capping"
                );
            }
        }

        let counters = Arc::new(PoolCounters::default());
        let pool = create_pool(
            &self.database_url,
            &config,
            self.backend_limit,
            Arc::clone(&counters),
        )?;

        debug!(
            database = %self.database_url,
            max_open = config.max_open,
            max_idle = %config.effective_max_idle(),
            "SQLite pool opened"
        );
        Ok(SqlitePool::new(pool, counters, config))
    }
}

impl Default for SqliteConnector {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_URL)
    }
}

#[async_trait]
impl PoolConnector for SqliteConnector {
    async fn connect(&self, config: &PoolConfig) -> Result<Arc<dyn PoolHandle>, SetupError> {
        let connector = self.clone();
        let config = config.clone();
        let pool = tokio::task::spawn_blocking(move || connector.open_blocking(config))
            .await
            .map_err(|e| SetupError::Build(e.to_string()))??;
        Ok(Arc::new(pool))
    }

    fn describe(&self) -> String {
        match self.backend_limit {
            Some(limit) => format!("sqlite {} (backend limit {limit})", self.database_url),
            None => format!("sqlite {}", self.database_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> PoolConfig {
        PoolConfig::new(4, 4, Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn connect_opens_memory_pool() {
        let pool = SqliteConnector::default().connect(&config()).await.unwrap();
        assert_eq!(pool.config().max_open, 4);
        assert_eq!(pool.stats().unwrap().open_connections, 0);
    }

    #[tokio::test]
    async fn connect_to_unreachable_database_is_setup_error() {
        let connector = SqliteConnector::new("/nonexistent/poolbench/dir/db.sqlite");
        let err = connector.connect(&config()).await.err().unwrap();
        assert!(matches!(err, SetupError::Connect { .. }));
    }

    #[test]
    fn describe_mentions_backend_limit() {
        let connector = SqliteConnector::default().with_backend_limit(Some(50));
        assert_eq!(connector.describe(), "sqlite :memory: (backend limit 50)");
    }
}
