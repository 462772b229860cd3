use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Document};
use delivery_kernel::settings::IndexSpec;

use crate::error::DbError;
use crate::store::{index_keys, index_name, NewUser, Store};

#[derive(Debug)]
struct Collection {
    documents: Vec<Document>,
    indexes: BTreeMap<String, Document>,
}

impl Collection {
    fn new() -> Self {
        let mut indexes = BTreeMap::new();
        indexes.insert("_id_".to_string(), doc! { "_id": 1 });
        Self {
            documents: Vec::new(),
            indexes,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<String, Collection>,
    users: BTreeMap<String, NewUser>,
}

/// In-process [`Store`] with the conflict behaviour of a MongoDB server:
/// duplicate collections and users are rejected, inserts and index creation
/// create the collection implicitly, identical indexes are a no-op.
///
/// Filters passed to `count_documents` support top-level equality only.
#[derive(Debug)]
pub struct MemoryStore {
    database: String,
    state: Mutex<State>,
}

impl MemoryStore {
    /// Empty store bound to `database`.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Pre-register a user, e.g. to simulate a half-initialized target.
    pub fn with_user(self, user: NewUser) -> Self {
        self.lock().users.insert(user.username.clone(), user);
        self
    }

    /// Snapshot of the documents in `collection`.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.lock()
            .collections
            .get(collection)
            .map(|collection| collection.documents.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn filter_matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

#[async_trait]
impl Store for MemoryStore {
    fn database_name(&self) -> &str {
        &self.database
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, DbError> {
        Ok(self.lock().collections.contains_key(collection))
    }

    async fn create_collection(&self, collection: &str) -> Result<(), DbError> {
        let mut state = self.lock();
        if state.collections.contains_key(collection) {
            return Err(DbError::CollectionExists(collection.to_string()));
        }
        state
            .collections
            .insert(collection.to_string(), Collection::new());
        Ok(())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, DbError> {
        let mut state = self.lock();
        let target = state
            .collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);

        let inserted = documents.len();
        for mut document in documents {
            if !document.contains_key("_id") {
                document.insert("_id", ObjectId::new());
            }
            target.documents.push(document);
        }
        Ok(inserted)
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64, DbError> {
        let state = self.lock();
        let count = state
            .collections
            .get(collection)
            .map(|collection| {
                collection
                    .documents
                    .iter()
                    .filter(|document| filter_matches(document, &filter))
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<String, DbError> {
        let mut state = self.lock();
        let target = state
            .collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);

        let name = index_name(index);
        target
            .indexes
            .entry(name.clone())
            .or_insert_with(|| index_keys(index));
        Ok(name)
    }

    async fn index_keys(&self, collection: &str) -> Result<Vec<Document>, DbError> {
        let state = self.lock();
        Ok(state
            .collections
            .get(collection)
            .map(|collection| collection.indexes.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn user_exists(&self, username: &str) -> Result<bool, DbError> {
        Ok(self.lock().users.contains_key(username))
    }

    async fn create_user(&self, user: &NewUser) -> Result<(), DbError> {
        let mut state = self.lock();
        if state.users.contains_key(&user.username) {
            return Err(DbError::UserExists(user.username.clone()));
        }
        state.users.insert(user.username.clone(), user.clone());
        Ok(())
    }
}
