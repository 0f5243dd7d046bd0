// Typed collections over the document store

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

use crate::core::id_generator::DocIdGenerator;
use crate::core::strong_types::DocId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{Document, DocumentStore, Filter, SortOrder, StoredDocument};
use crate::infrastructure::sqlite_database::SqliteDocumentStore;

/// Shared handle to the store plus the id generator that names new documents
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
    ids: Arc<DocIdGenerator>,
}

impl Database {
    pub fn new(store: Arc<dyn DocumentStore>, ids: Arc<DocIdGenerator>) -> Self {
        Self { store, ids }
    }

    pub async fn in_memory() -> AppResult<Self> {
        let store = SqliteDocumentStore::new_in_memory().await?;
        Ok(Self::new(Arc::new(store), Arc::new(DocIdGenerator::default())))
    }

    pub fn collection<T>(&self, name: &'static str) -> Collection<T> {
        Collection {
            name,
            store: self.store.clone(),
            ids: self.ids.clone(),
            _marker: PhantomData,
        }
    }
}

/// A stored document with its metadata, serialized with the body flattened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    #[serde(rename = "_id")]
    pub id: DocId,
    #[serde(rename = "dateCreated")]
    pub date_created: i64,
    #[serde(rename = "dateUpdated")]
    pub date_updated: i64,
    /// Store version the record was read at
    #[serde(skip)]
    pub version: i64,
    #[serde(flatten)]
    pub doc: T,
}

impl<T> std::ops::Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.doc
    }
}

/// Turn any serializable value into a document body; it must serialize to a JSON object
pub fn to_document(value: &impl Serialize) -> AppResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::SerializationError(format!(
            "Expected a JSON object, got {}",
            other
        ))),
    }
}

/// Conditional writes that keep losing to concurrent writers give up after this many tries
const MAX_WRITE_ATTEMPTS: usize = 32;

pub struct Collection<T> {
    name: &'static str,
    store: Arc<dyn DocumentStore>,
    ids: Arc<DocIdGenerator>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            store: self.store.clone(),
            ids: self.ids.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn decode(&self, stored: StoredDocument) -> AppResult<Record<T>> {
        let id = stored.id;
        let doc = serde_json::from_value(Value::Object(stored.data)).map_err(|e| {
            AppError::SerializationError(format!(
                "Document {} in {} does not decode: {}",
                id, self.name, e
            ))
        })?;
        Ok(Record {
            id,
            date_created: stored.created_time,
            date_updated: stored.updated_time,
            version: stored.version,
            doc,
        })
    }

    pub async fn create(&self, doc: &T) -> AppResult<DocId> {
        let id = self.ids.next_id();
        self.store.create(self.name, id, to_document(doc)?).await?;
        Ok(id)
    }

    pub async fn read_one(&self, filter: &Filter) -> AppResult<Option<Record<T>>> {
        self.store
            .read_one(self.name, filter)
            .await?
            .map(|stored| self.decode(stored))
            .transpose()
    }

    pub async fn read_by_id(&self, id: DocId) -> AppResult<Option<Record<T>>> {
        self.read_one(&Filter::by_id(id)).await
    }

    pub async fn read_many(&self, filter: &Filter, order: SortOrder) -> AppResult<Vec<Record<T>>> {
        self.store
            .read_many(self.name, filter, order)
            .await?
            .into_iter()
            .map(|stored| self.decode(stored))
            .collect()
    }

    pub async fn update_one(&self, filter: &Filter, patch: &impl Serialize) -> AppResult<bool> {
        self.store
            .update_one(self.name, filter, to_document(patch)?)
            .await
    }

    /// Read-modify-write of the first document matching `filter`.
    ///
    /// `edit` derives a patch from the current record, or fails to abort. The
    /// patch is written only if the document is unchanged since that read;
    /// otherwise the document is read again and `edit` runs on the newer
    /// state. Returns the record the written patch was derived from, or
    /// `None` when nothing matches.
    pub async fn modify<P, F>(&self, filter: &Filter, mut edit: F) -> AppResult<Option<Record<T>>>
    where
        P: Serialize,
        F: FnMut(&Record<T>) -> AppResult<P> + Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let Some(current) = self.read_one(filter).await? else {
                return Ok(None);
            };
            let patch = to_document(&edit(&current)?)?;
            if self
                .store
                .update_if_version(self.name, current.id, current.version, patch)
                .await?
            {
                return Ok(Some(current));
            }
            debug!(
                "Document {} in {} changed during write, attempt {}",
                current.id, self.name, attempt
            );
        }
        Err(AppError::Internal(format!(
            "Gave up writing to {} after {} conflicting attempts",
            self.name, MAX_WRITE_ATTEMPTS
        )))
    }

    pub async fn delete_one(&self, filter: &Filter) -> AppResult<bool> {
        self.store.delete_one(self.name, filter).await
    }

    pub async fn delete_many(&self, filter: &Filter) -> AppResult<u64> {
        self.store.delete_many(self.name, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[tokio::test]
    async fn test_typed_round_trip_and_patch() {
        let db = Database::in_memory().await.unwrap();
        let notes = db.collection::<Note>("notes");

        let id = notes
            .create(&Note { text: "first".into(), tags: vec![] })
            .await
            .unwrap();
        notes
            .update_one(&Filter::by_id(id), &json!({"tags": ["a"]}))
            .await
            .unwrap();

        let record = notes.read_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.text, "first");
        assert_eq!(record.tags, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_record_serializes_flat() {
        let record = Record {
            id: DocId(3),
            date_created: 1,
            date_updated: 2,
            version: 4,
            doc: Note { text: "x".into(), tags: vec![] },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["_id"], "3");
        assert_eq!(value["text"], "x");
        assert_eq!(value["dateUpdated"], 2);
        assert!(value.get("version").is_none());
    }

    #[tokio::test]
    async fn test_modify_reapplies_edit_after_conflict() {
        let db = Database::in_memory().await.unwrap();
        let notes = db.collection::<Note>("notes");
        let id = notes
            .create(&Note { text: "n".into(), tags: vec![] })
            .await
            .unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let notes = notes.clone();
                tokio::spawn(async move {
                    notes
                        .modify(&Filter::by_id(id), |note| {
                            let mut tags = note.tags.clone();
                            tags.push(format!("t{}", i));
                            Ok(json!({ "tags": tags }))
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_some());
        }

        let record = notes.read_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.tags.len(), 8);
        assert_eq!(record.version, 8);
    }

    #[tokio::test]
    async fn test_modify_missing_and_aborted() {
        let db = Database::in_memory().await.unwrap();
        let notes = db.collection::<Note>("notes");
        let missing = notes
            .modify(&Filter::by_id(DocId(5)), |_| Ok(json!({})))
            .await
            .unwrap();
        assert!(missing.is_none());

        let id = notes
            .create(&Note { text: "n".into(), tags: vec![] })
            .await
            .unwrap();
        let aborted = notes
            .modify(&Filter::by_id(id), |_| -> AppResult<Value> {
                Err(AppError::NotAllowed("no".into()))
            })
            .await;
        assert!(matches!(aborted, Err(AppError::NotAllowed(_))));
        assert_eq!(notes.read_by_id(id).await.unwrap().unwrap().version, 0);
    }

    #[test]
    fn test_to_document_rejects_scalars() {
        assert!(to_document(&5).is_err());
        assert!(to_document(&json!({"a": 1})).is_ok());
    }
}
