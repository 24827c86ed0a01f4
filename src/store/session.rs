use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DocumentStore, SchedulingStore};
use crate::data::user::db::UserDbExt;
use crate::data::user::User;
use crate::error::{SchedulingError, StoreError};

pub static SESSION_KEY: &str = "currentUser";
pub static SESSION_INDEX_KEY: &str = "flowSessions";

/// Session record known to the store, used to expire abandoned logins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub key: String,
    pub started_at: DateTime<Utc>,
}

/// Who is logged in on one client, persisted through the document store.
pub struct Session<'a, S> {
    store: &'a SchedulingStore<S>,
    key: String,
}

impl<S: DocumentStore> SchedulingStore<S> {
    /// Session of a single-client deployment, kept under `currentUser`.
    pub fn local_session(&self) -> Session<'_, S> {
        Session {
            store: self,
            key: SESSION_KEY.to_string(),
        }
    }

    /// Session of one of many clients, told apart by `id`.
    pub fn session(&self, id: &str) -> Session<'_, S> {
        Session {
            store: self,
            key: format!("{}.{}", SESSION_KEY, id),
        }
    }

    fn session_expired(&self, entry: &SessionEntry) -> bool {
        (self.now() - entry.started_at)
            .to_std()
            .is_ok_and(|age| age > self.settings.session_ttl)
    }

    /// Drops every session older than the configured lifetime, returning how
    /// many were removed.
    #[tracing::instrument(skip(self))]
    pub async fn prune_sessions(&self) -> Result<usize, SchedulingError> {
        let expired: Vec<String> = self
            .collection::<SessionEntry>(SESSION_INDEX_KEY)
            .await?
            .into_iter()
            .filter(|entry| self.session_expired(entry))
            .map(|entry| entry.key)
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }

        for key in &expired {
            self.bounded(self.backend.remove(key)).await?;
        }
        self.update_collection(SESSION_INDEX_KEY, |entries: &mut Vec<SessionEntry>| {
            entries.retain(|entry| !expired.contains(&entry.key));
            Ok(())
        })
        .await?;

        tracing::info!("Pruned {} expired sessions.", expired.len());
        Ok(expired.len())
    }
}

impl<'a, S: DocumentStore> Session<'a, S> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Logged in user, re-read from the user collection. A session that has
    /// expired, or whose user has since been deleted, is cleared.
    pub async fn current_user(&self) -> Result<Option<User>, SchedulingError> {
        let stored = match self.store.bounded(self.store.backend.load(&self.key)).await? {
            Some(it) if !it.value.is_null() => it,
            _ => return Ok(None),
        };

        let user: User =
            serde_json::from_value(stored.value).map_err(|source| StoreError::Malformed {
                key: self.key.clone(),
                source,
            })?;

        // records without an index entry predate expiry and stay valid
        let expired = self
            .store
            .collection::<SessionEntry>(SESSION_INDEX_KEY)
            .await?
            .iter()
            .any(|entry| entry.key == self.key && self.store.session_expired(entry));
        if expired {
            tracing::info!("session {} expired, logging out", self.key);
            self.clear().await?;
            return Ok(None);
        }

        match self.store.find_user(&user.id).await? {
            Some(fresh) => Ok(Some(fresh)),
            None => {
                tracing::info!("session user {} no longer exists, logging out", user.id);
                self.clear().await?;
                Ok(None)
            }
        }
    }

    pub async fn set_current_user(&self, user: &User) -> Result<(), SchedulingError> {
        let value = serde_json::to_value(user).map_err(StoreError::from)?;
        self.store
            .bounded(self.store.backend.save(&self.key, value))
            .await?;

        let entry = SessionEntry {
            key: self.key.clone(),
            started_at: self.store.now(),
        };
        self.store
            .update_collection(SESSION_INDEX_KEY, |entries: &mut Vec<SessionEntry>| {
                entries.retain(|e| e.key != entry.key);
                entries.push(entry.clone());
                Ok(())
            })
            .await
    }

    /// Returns whether anybody was logged in.
    pub async fn clear(&self) -> Result<bool, SchedulingError> {
        let removed = self.store.bounded(self.store.backend.remove(&self.key)).await?;
        self.store
            .update_collection(SESSION_INDEX_KEY, |entries: &mut Vec<SessionEntry>| {
                entries.retain(|e| e.key != self.key);
                Ok(())
            })
            .await?;
        Ok(removed)
    }
}
