use super::{StoreBackend, StoreError};
use async_trait::async_trait;
use log::error;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};

/// Redis-backed table/row store. Each logical table maps to one Redis hash,
/// with rows as hash fields holding JSON values. Values carry their own
/// expiry; no key-level TTL is set.
#[derive(Clone)]
pub struct RedisStore {
    _client: Client,
    conn_manager: ConnectionManager,
}

impl RedisStore {
    /// Initialize a new Redis store instance
    pub async fn new(redis_url: &str) -> Result<Self, String> {
        let client = match Client::open(redis_url) {
            Ok(client) => client,
            Err(err) => {
                return Err(format!("Failed to connect to Redis: {}", err));
            }
        };

        let conn_manager = match ConnectionManager::new(client.clone()).await {
            Ok(manager) => manager,
            Err(err) => {
                return Err(format!(
                    "Failed to create Redis connection manager: {}",
                    err
                ));
            }
        };

        // Test the connection to ensure it's working
        let mut conn = conn_manager.clone();
        if let Err(err) = redis::cmd("PING").query_async::<String>(&mut conn).await {
            return Err(format!("Failed to ping Redis: {}", err));
        }

        Ok(Self {
            conn_manager,
            _client: client,
        })
    }
}

#[async_trait]
impl StoreBackend for RedisStore {
    async fn put<T: Serialize + Send + Sync>(
        &self,
        table: &str,
        row: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(value)?;
        let mut conn = self.conn_manager.clone();

        match conn.hset::<_, _, _, ()>(table, row, serialized).await {
            Ok(_) => Ok(()),
            Err(err) => {
                error!("Redis error while writing {}/{}: {}", table, row, err);
                Err(StoreError::Redis(err.to_string()))
            }
        }
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        table: &str,
        row: &str,
    ) -> Result<Option<T>, StoreError> {
        let mut conn = self.conn_manager.clone();

        let result: Option<String> = match conn.hget(table, row).await {
            Ok(value) => value,
            Err(err) => {
                error!("Redis error while reading {}/{}: {}", table, row, err);
                return Err(StoreError::Redis(err.to_string()));
            }
        };

        if let Some(value) = result {
            serde_json::from_str(&value)
                .map_err(|e| StoreError::Deserialization(e.to_string()))
                .map(Some)
        } else {
            Ok(None)
        }
    }

    async fn rows<T: DeserializeOwned + Send + Sync>(
        &self,
        table: &str,
    ) -> Result<Vec<T>, StoreError> {
        let mut conn = self.conn_manager.clone();

        let values: Vec<String> = match conn.hvals(table).await {
            Ok(values) => values,
            Err(err) => {
                error!("Redis error while scanning {}: {}", table, err);
                return Err(StoreError::Redis(err.to_string()));
            }
        };

        values
            .iter()
            .map(|value| {
                serde_json::from_str(value).map_err(|e| StoreError::Deserialization(e.to_string()))
            })
            .collect()
    }

    async fn delete(&self, table: &str, row: &str) -> Result<(), StoreError> {
        let mut conn = self.conn_manager.clone();

        match conn.hdel::<_, _, ()>(table, row).await {
            Ok(_) => Ok(()),
            Err(err) => {
                error!("Redis error while deleting {}/{}: {}", table, row, err);
                Err(StoreError::Redis(err.to_string()))
            }
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        let mut conn = self.conn_manager.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => Ok(()),
            Err(err) => Err(format!("Redis health check failed: {}", err)),
        }
    }
}
