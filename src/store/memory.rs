use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;

use super::{DocumentStore, Versioned};
use crate::error::StoreError;

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Versioned>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl DocumentStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Versioned>, StoreError> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let revision = documents.get(key).map(|it| it.revision).unwrap_or(0) + 1;
        documents.insert(key.to_string(), Versioned { value, revision });
        Ok(())
    }

    async fn save_if(
        &self,
        key: &str,
        value: Value,
        expected: Option<u64>,
    ) -> Result<bool, StoreError> {
        let mut documents = self.documents.write().await;
        let current = documents.get(key).map(|it| it.revision);
        if current != expected {
            return Ok(false);
        }

        let revision = current.unwrap_or(0) + 1;
        documents.insert(key.to_string(), Versioned { value, revision });
        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.documents.write().await.remove(key).is_some())
    }
}
