use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod memory;
pub mod redis;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to parse value: {0}")]
    Deserialization(String),
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Table/row key-value backend shared by the authorization and consent stores.
///
/// A table is a named collection of rows, each row a JSON-serialized value
/// addressed by a string key. Backends must support listing every row of a
/// table because token lookup scans the full authorization table. The store
/// applies no TTL of its own; expiry lives inside the stored values and is
/// checked by consumers.
///
/// Implementations must be thread-safe (Send + Sync) and cloneable to
/// support sharing across handlers.
#[async_trait::async_trait]
pub trait StoreBackend: Send + Sync {
    /// Insert or replace a row
    async fn put<T: Serialize + Send + Sync>(
        &self,
        table: &str,
        row: &str,
        value: &T,
    ) -> Result<(), StoreError>;

    /// Retrieve a single row
    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        table: &str,
        row: &str,
    ) -> Result<Option<T>, StoreError>;

    /// Retrieve every row of a table
    async fn rows<T: DeserializeOwned + Send + Sync>(
        &self,
        table: &str,
    ) -> Result<Vec<T>, StoreError>;

    /// Delete a row
    async fn delete(&self, table: &str, row: &str) -> Result<(), StoreError>;

    /// Performs a deep health check on the store backend
    ///
    /// For Redis this pings the server; for the in-memory backend it only
    /// confirms the store is initialized.
    async fn health_check(&self) -> Result<(), String>;
}

/// Store implementation that provides a uniform interface regardless of backend.
///
/// The concrete implementation is chosen at runtime from configuration; the
/// enum keeps the generic trait methods usable without trait objects.
#[derive(Clone)]
pub enum Store {
    /// In-memory store, used in tests and single-node deployments
    InMemory(memory::MemoryStore),
    /// Redis-based store, one hash per table
    Redis(redis::RedisStore),
}

#[async_trait::async_trait]
impl StoreBackend for Store {
    async fn put<T: Serialize + Send + Sync>(
        &self,
        table: &str,
        row: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        match self {
            Self::InMemory(store) => store.put(table, row, value).await,
            Self::Redis(store) => store.put(table, row, value).await,
        }
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        table: &str,
        row: &str,
    ) -> Result<Option<T>, StoreError> {
        match self {
            Self::InMemory(store) => store.get(table, row).await,
            Self::Redis(store) => store.get(table, row).await,
        }
    }

    async fn rows<T: DeserializeOwned + Send + Sync>(
        &self,
        table: &str,
    ) -> Result<Vec<T>, StoreError> {
        match self {
            Self::InMemory(store) => store.rows(table).await,
            Self::Redis(store) => store.rows(table).await,
        }
    }

    async fn delete(&self, table: &str, row: &str) -> Result<(), StoreError> {
        match self {
            Self::InMemory(store) => store.delete(table, row).await,
            Self::Redis(store) => store.delete(table, row).await,
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        match self {
            Self::InMemory(store) => store.health_check().await,
            Self::Redis(store) => store.health_check().await,
        }
    }
}

/// Factory function to create the appropriate store implementation based on configuration.
pub async fn create_store(config: &crate::config::AuthServerConfig) -> Result<Store, StoreError> {
    match config.store.backend {
        crate::config::StoreBackendKind::InMemory => {
            Ok(Store::InMemory(memory::MemoryStore::new()))
        }
        crate::config::StoreBackendKind::Redis => {
            if config.store.redis.url.is_empty() {
                return Err(StoreError::Config(
                    "Redis URL is required for the Redis store".to_string(),
                ));
            }
            let store = redis::RedisStore::new(&config.store.redis.url)
                .await
                .map_err(StoreError::Config)?;
            Ok(Store::Redis(store))
        }
    }
}
