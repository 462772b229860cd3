use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Document};
use delivery_kernel::settings::{DatabaseSettings, IndexSpec};
use futures::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database, IndexModel};

use crate::error::{command_code, DbError, NAMESPACE_EXISTS, USER_ALREADY_EXISTS};
use crate::store::{index_keys, NewUser, Store};

/// [`Store`] backed by a MongoDB server.
#[derive(Debug, Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Connect to `settings.uri`, select `settings.name` and ping the server
    /// so an unreachable target fails here rather than at the first write.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, DbError> {
        tracing::debug!(database = %settings.name, "setting up mongo client");

        let mut options = ClientOptions::parse(&settings.uri).await?;
        options.app_name = Some(settings.app_name.clone());
        options.server_selection_timeout = Some(Duration::from_millis(settings.server_selection_timeout_ms));

        let client = Client::with_options(options)?;
        let store = Self::from_client(client, &settings.name);

        store.database.run_command(doc! { "ping": 1 }, None).await?;

        tracing::info!(database = %settings.name, "selected database");
        Ok(store)
    }

    /// Wrap an existing client, selecting `database` without touching the server.
    pub fn from_client(client: Client, database: &str) -> Self {
        Self {
            database: client.database(database),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.database.collection(name)
    }
}

#[async_trait]
impl Store for MongoStore {
    fn database_name(&self) -> &str {
        self.database.name()
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, DbError> {
        let names = self
            .database
            .list_collection_names(doc! { "name": collection })
            .await?;
        Ok(names.iter().any(|name| name == collection))
    }

    async fn create_collection(&self, collection: &str) -> Result<(), DbError> {
        match self.database.create_collection(collection, None).await {
            Ok(()) => Ok(()),
            Err(err) if command_code(&err) == Some(NAMESPACE_EXISTS) => {
                Err(DbError::CollectionExists(collection.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, DbError> {
        let result = self.collection(collection).insert_many(documents, None).await?;
        Ok(result.inserted_ids.len())
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64, DbError> {
        Ok(self.collection(collection).count_documents(filter, None).await?)
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<String, DbError> {
        let model = IndexModel::builder().keys(index_keys(index)).build();
        let result = self.collection(collection).create_index(model, None).await?;
        Ok(result.index_name)
    }

    async fn index_keys(&self, collection: &str) -> Result<Vec<Document>, DbError> {
        let indexes: Vec<IndexModel> = self
            .collection(collection)
            .list_indexes(None)
            .await?
            .try_collect()
            .await?;
        Ok(indexes.into_iter().map(|index| index.keys).collect())
    }

    async fn user_exists(&self, username: &str) -> Result<bool, DbError> {
        let response = self
            .database
            .run_command(doc! { "usersInfo": username }, None)
            .await?;

        let users = response
            .get_array("users")
            .map_err(|err| DbError::UnexpectedResponse {
                command: "usersInfo",
                message: err.to_string(),
            })?;
        Ok(!users.is_empty())
    }

    async fn create_user(&self, user: &NewUser) -> Result<(), DbError> {
        match self.database.run_command(user.create_command(), None).await {
            Ok(_) => Ok(()),
            Err(err) if command_code(&err) == Some(USER_ALREADY_EXISTS) => {
                Err(DbError::UserExists(user.username.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
