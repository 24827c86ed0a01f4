use bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::UpdateOptions;
use mongodb::{Collection, Database};
use serde_json::Value;

use super::{DocumentStore, Versioned};
use crate::error::StoreError;

const DUPLICATE_KEY: i32 = 11000;

/// One MongoDB document per key: `{ _id: key, value, revision }`.
#[derive(Debug, Clone)]
pub struct MongoStore {
    documents: Collection<Document>,
}

impl MongoStore {
    pub fn new(db: &Database, collection: impl AsRef<str>) -> MongoStore {
        MongoStore {
            documents: db.collection(collection.as_ref()),
        }
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

impl DocumentStore for MongoStore {
    async fn load(&self, key: &str) -> Result<Option<Versioned>, StoreError> {
        let found = self.documents.find_one(doc! { "_id": key }, None).await?;

        Ok(found.map(|document| {
            let revision = document.get_i64("revision").unwrap_or(0).max(0) as u64;
            let value = document
                .get("value")
                .cloned()
                .unwrap_or(Bson::Null)
                .into_relaxed_extjson();
            Versioned { value, revision }
        }))
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let value = bson::to_bson(&value)?;
        self.documents
            .update_one(
                doc! { "_id": key },
                doc! { "$set": { "value": value }, "$inc": { "revision": 1i64 } },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn save_if(
        &self,
        key: &str,
        value: Value,
        expected: Option<u64>,
    ) -> Result<bool, StoreError> {
        let value = bson::to_bson(&value)?;

        match expected {
            None => {
                let inserted = self
                    .documents
                    .insert_one(doc! { "_id": key, "value": value, "revision": 1i64 }, None)
                    .await;
                match inserted {
                    Ok(_) => Ok(true),
                    Err(e) if is_duplicate_key(&e) => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
            Some(revision) => {
                let updated = self
                    .documents
                    .update_one(
                        doc! { "_id": key, "revision": (revision as i64) },
                        doc! { "$set": { "value": value }, "$inc": { "revision": 1i64 } },
                        None,
                    )
                    .await?;
                Ok(updated.matched_count == 1)
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let deleted = self.documents.delete_one(doc! { "_id": key }, None).await?;
        Ok(deleted.deleted_count > 0)
    }
}
