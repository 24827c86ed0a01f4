use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub mod memory;
pub mod mongo;
pub mod session;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use session::Session;

use crate::clock::{Clock, SystemClock};
use crate::config::{BootstrapAdmin, Config};
use crate::error::{SchedulingError, StoreError};

/// A stored value and the revision it was written at. Revisions start at 1 and
/// grow by one with every write to the key.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub value: Value,
    pub revision: u64,
}

/// Key/value document store holding whole values per key.
#[allow(async_fn_in_trait)]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Versioned>, StoreError>;

    /// Unconditional overwrite.
    async fn save(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Writes only if the key is still at `expected` (`None` meaning the key
    /// must not exist yet). Returns `false` when another writer got there first.
    async fn save_if(
        &self,
        key: &str,
        value: Value,
        expected: Option<u64>,
    ) -> Result<bool, StoreError>;

    async fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

/// Backend picked by configuration at start-up.
pub enum Backend {
    Memory(MemoryStore),
    Mongo(MongoStore),
}

impl DocumentStore for Backend {
    async fn load(&self, key: &str) -> Result<Option<Versioned>, StoreError> {
        match self {
            Backend::Memory(store) => store.load(key).await,
            Backend::Mongo(store) => store.load(key).await,
        }
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StoreError> {
        match self {
            Backend::Memory(store) => store.save(key, value).await,
            Backend::Mongo(store) => store.save(key, value).await,
        }
    }

    async fn save_if(
        &self,
        key: &str,
        value: Value,
        expected: Option<u64>,
    ) -> Result<bool, StoreError> {
        match self {
            Backend::Memory(store) => store.save_if(key, value, expected).await,
            Backend::Mongo(store) => store.save_if(key, value, expected).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        match self {
            Backend::Memory(store) => store.remove(key).await,
            Backend::Mongo(store) => store.remove(key).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub timeout: Duration,
    pub max_write_attempts: u32,
    pub bootstrap_admin: BootstrapAdmin,
    pub session_ttl: Duration,
}

impl From<&Config> for StoreSettings {
    fn from(config: &Config) -> Self {
        StoreSettings {
            timeout: config.store_timeout(),
            max_write_attempts: config.max_write_attempts,
            bootstrap_admin: config.bootstrap_admin.clone(),
            session_ttl: config.session_ttl(),
        }
    }
}

/// Owns the users, classes and notifications collections. The operations live
/// in the `*DbExt` traits next to each model.
pub struct SchedulingStore<S> {
    backend: S,
    settings: StoreSettings,
    clock: Arc<dyn Clock>,
}

impl<S: DocumentStore> SchedulingStore<S> {
    pub fn new(backend: S, settings: StoreSettings) -> SchedulingStore<S> {
        SchedulingStore {
            backend,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> SchedulingStore<S> {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.settings.timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("store call timed out after {:?}", self.settings.timeout);
                Err(StoreError::Timeout(self.settings.timeout))
            }
        }
    }

    pub(crate) async fn load_collection<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<(Vec<T>, Option<u64>), SchedulingError> {
        let stored = match self.bounded(self.backend.load(key)).await? {
            Some(it) => it,
            None => return Ok((vec![], None)),
        };

        if stored.value.is_null() {
            return Ok((vec![], Some(stored.revision)));
        }

        let items = serde_json::from_value(stored.value).map_err(|source| StoreError::Malformed {
            key: key.to_string(),
            source,
        })?;

        Ok((items, Some(stored.revision)))
    }

    pub(crate) async fn collection<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Vec<T>, SchedulingError> {
        Ok(self.load_collection(key).await?.0)
    }

    /// Read-modify-write of a whole collection guarded by its revision. `apply`
    /// runs against fresh data on every attempt; an error from it aborts the
    /// update without writing.
    pub(crate) async fn update_collection<T, R, F>(
        &self,
        key: &str,
        mut apply: F,
    ) -> Result<R, SchedulingError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut Vec<T>) -> Result<R, SchedulingError>,
    {
        let attempts = self.settings.max_write_attempts.max(1);

        for attempt in 1..=attempts {
            let (mut items, revision) = self.load_collection::<T>(key).await?;
            let result = apply(&mut items)?;

            let value = serde_json::to_value(&items).map_err(StoreError::from)?;
            if self.bounded(self.backend.save_if(key, value, revision)).await? {
                return Ok(result);
            }

            tracing::debug!(key, attempt, "collection changed underneath, retrying");
        }

        tracing::warn!(key, attempts, "giving up on conflicting writes");
        Err(SchedulingError::Conflict(key.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SchedulingStore<MemoryStore> {
        SchedulingStore::new(MemoryStore::new(), StoreSettings::from(&Config::in_memory()))
    }

    /// Bumps the revision behind the store's back on its first `n` writes.
    struct Contended {
        inner: MemoryStore,
        interference: std::sync::atomic::AtomicU32,
    }

    impl DocumentStore for Contended {
        async fn load(&self, key: &str) -> Result<Option<Versioned>, StoreError> {
            self.inner.load(key).await
        }

        async fn save(&self, key: &str, value: Value) -> Result<(), StoreError> {
            self.inner.save(key, value).await
        }

        async fn save_if(
            &self,
            key: &str,
            value: Value,
            expected: Option<u64>,
        ) -> Result<bool, StoreError> {
            use std::sync::atomic::Ordering;
            if self.interference.load(Ordering::SeqCst) > 0 {
                self.interference.fetch_sub(1, Ordering::SeqCst);
                self.inner.save(key, json!(["sneaky"])).await?;
            }
            self.inner.save_if(key, value, expected).await
        }

        async fn remove(&self, key: &str) -> Result<bool, StoreError> {
            self.inner.remove(key).await
        }
    }

    #[rocket::async_test]
    async fn missing_collection_is_empty() {
        let store = store();
        let (items, revision) = store.load_collection::<String>("flowClasses").await.unwrap();
        assert!(items.is_empty());
        assert_eq!(revision, None);
    }

    #[rocket::async_test]
    async fn update_writes_whole_collection() {
        let store = store();
        store
            .update_collection("letters", |items: &mut Vec<String>| {
                items.push("a".to_string());
                Ok(())
            })
            .await
            .unwrap();
        store
            .update_collection("letters", |items: &mut Vec<String>| {
                items.push("b".to_string());
                Ok(())
            })
            .await
            .unwrap();

        let stored = store.backend().load("letters").await.unwrap().unwrap();
        assert_eq!(stored.value, json!(["a", "b"]));
        assert_eq!(stored.revision, 2);
    }

    #[rocket::async_test]
    async fn lost_race_reapplies_on_fresh_data() {
        let store = SchedulingStore::new(
            Contended {
                inner: MemoryStore::new(),
                interference: 1.into(),
            },
            StoreSettings::from(&Config::in_memory()),
        );

        let mut runs = 0;
        store
            .update_collection("letters", |items: &mut Vec<String>| {
                runs += 1;
                items.push("mine".to_string());
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(runs, 2);
        let stored = store.backend().load("letters").await.unwrap().unwrap();
        assert_eq!(stored.value, json!(["sneaky", "mine"]));
    }

    #[rocket::async_test]
    async fn persistent_contention_is_a_conflict() {
        let mut settings = StoreSettings::from(&Config::in_memory());
        settings.max_write_attempts = 2;
        let store = SchedulingStore::new(
            Contended {
                inner: MemoryStore::new(),
                interference: 10.into(),
            },
            settings,
        );

        let result = store
            .update_collection("letters", |items: &mut Vec<String>| {
                items.push("mine".to_string());
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(SchedulingError::Conflict(key)) if key == "letters"));
    }

    #[rocket::async_test]
    async fn failed_apply_writes_nothing() {
        let store = store();
        let result = store
            .update_collection("letters", |_: &mut Vec<String>| -> Result<(), SchedulingError> {
                Err(SchedulingError::TooSoon)
            })
            .await;

        assert!(matches!(result, Err(SchedulingError::TooSoon)));
        assert!(store.backend().load("letters").await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn malformed_collection_is_reported() {
        let store = store();
        store.backend().save("flowUsers", json!({"users": 3})).await.unwrap();

        let result = store.collection::<String>("flowUsers").await;
        assert!(matches!(
            result,
            Err(SchedulingError::Persistence(StoreError::Malformed { .. }))
        ));
    }
}
