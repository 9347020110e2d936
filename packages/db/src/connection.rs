//! Database connection management.

use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect as connect_any};
use surrealdb::opt::auth::Root;
use taskqueue_core::QueueError;
use thiserror::Error;

pub const ENV_DB_ENDPOINT: &str = "TASK_QUEUE_DB_ENDPOINT";
pub const ENV_DB_NAMESPACE: &str = "TASK_QUEUE_DB_NAMESPACE";
pub const ENV_DB_DATABASE: &str = "TASK_QUEUE_DB_DATABASE";

/// Database connection handle. Cheap to clone; clones share the session.
pub type Database = Surreal<Any>;

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Connection endpoint: "mem://", "rocksdb://path", "ws://host:port", ...
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "taskqueue".to_string(),
            database: "main".to_string(),
            credentials: None,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a config for RocksDB persistence (requires rocksdb feature).
    pub fn rocksdb(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("rocksdb://{}", path.into()),
            ..Default::default()
        }
    }

    /// Read endpoint, namespace and database from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read endpoint, namespace and database through a key lookup.
    /// Blank values keep the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Self {
            endpoint: read(ENV_DB_ENDPOINT).unwrap_or(defaults.endpoint),
            namespace: read(ENV_DB_NAMESPACE).unwrap_or(defaults.namespace),
            database: read(ENV_DB_DATABASE).unwrap_or(defaults.database),
            credentials: None,
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set root credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(#[from] surrealdb::Error),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<DbError> for QueueError {
    fn from(err: DbError) -> Self {
        QueueError::Storage(err.to_string())
    }
}

/// Open a connection and select the configured namespace and database.
pub async fn connect(config: &DbConfig) -> Result<Database, DbError> {
    tracing::info!(endpoint = %config.endpoint, "Connecting to database");

    let db = connect_any(config.endpoint.as_str()).await?;

    if let Some((username, password)) = &config.credentials {
        db.signin(Root { username, password }).await?;
    }

    db.use_ns(config.namespace.as_str())
        .use_db(config.database.as_str())
        .await?;

    tracing::info!(
        namespace = %config.namespace,
        database = %config.database,
        "Connected to database"
    );

    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_lookup_overrides_defaults() {
        let config = DbConfig::from_lookup(|key| match key {
            ENV_DB_ENDPOINT => Some("rocksdb://data/queue".to_string()),
            ENV_DB_NAMESPACE => Some(" ".to_string()),
            _ => None,
        });

        assert_eq!(config.endpoint, "rocksdb://data/queue");
        assert_eq!(config.namespace, "taskqueue");
        assert_eq!(config.database, "main");
    }

    #[test]
    fn builders_set_fields() {
        let config = DbConfig::rocksdb("/tmp/q")
            .with_namespace("ns")
            .with_database("db")
            .with_credentials("root", "secret");

        assert_eq!(config.endpoint, "rocksdb:///tmp/q");
        assert_eq!(config.namespace, "ns");
        assert_eq!(config.database, "db");
        assert_eq!(
            config.credentials,
            Some(("root".to_string(), "secret".to_string()))
        );
    }
}
