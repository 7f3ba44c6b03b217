use super::{StoreBackend, StoreError};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory table/row store backed by a lock-guarded map.
///
/// Rows keep their JSON form so that serialization behaves identically to
/// the Redis backend. There is no hidden global state; every clone shares
/// the same tables through the inner Arc.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn put<T: Serialize + Send + Sync>(
        &self,
        table: &str,
        row: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(value)?;
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(row.to_string(), serialized);
        Ok(())
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        table: &str,
        row: &str,
    ) -> Result<Option<T>, StoreError> {
        let tables = self.tables.read().await;
        match tables.get(table).and_then(|rows| rows.get(row)) {
            Some(serialized) => serde_json::from_str(serialized)
                .map_err(|e| StoreError::Deserialization(e.to_string()))
                .map(Some),
            None => Ok(None),
        }
    }

    async fn rows<T: DeserializeOwned + Send + Sync>(
        &self,
        table: &str,
    ) -> Result<Vec<T>, StoreError> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        rows.values()
            .map(|serialized| {
                serde_json::from_str(serialized)
                    .map_err(|e| StoreError::Deserialization(e.to_string()))
            })
            .collect()
    }

    async fn delete(&self, table: &str, row: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(table) {
            rows.remove(row);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
