use async_trait::async_trait;
use bson::{doc, Bson, Document};
use delivery_kernel::settings::IndexSpec;

use crate::error::DbError;

/// A role bound to a database, as accepted by `createUser`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role: String,
    pub db: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: db.into(),
        }
    }

    pub fn to_document(&self) -> Document {
        doc! { "role": self.role.as_str(), "db": self.db.as_str() }
    }
}

/// Credential handed to [`Store::create_user`].
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub roles: Vec<RoleGrant>,
}

impl NewUser {
    /// The `createUser` command document for this credential.
    pub fn create_command(&self) -> Document {
        let roles: Vec<Bson> = self
            .roles
            .iter()
            .map(|role| Bson::Document(role.to_document()))
            .collect();

        doc! {
            "createUser": self.username.as_str(),
            "pwd": self.password.as_str(),
            "roles": roles,
        }
    }
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("roles", &self.roles)
            .finish()
    }
}

/// Index key document for a single-field index, e.g. `{ "user_id": 1 }`.
pub fn index_keys(index: &IndexSpec) -> Document {
    let mut keys = Document::new();
    keys.insert(index.field.clone(), index.order.direction());
    keys
}

/// Default server-side name of a single-field index, e.g. `user_id_1`.
pub fn index_name(index: &IndexSpec) -> String {
    format!("{}_{}", index.field, index.order.direction())
}

/// Document store operations used by the bootstrap, scoped to one database.
#[async_trait]
pub trait Store: Send + Sync {
    /// Name of the selected database.
    fn database_name(&self) -> &str;

    async fn collection_exists(&self, collection: &str) -> Result<bool, DbError>;

    /// Create an empty collection without options.
    /// Fails with [`DbError::CollectionExists`] if it is already there.
    async fn create_collection(&self, collection: &str) -> Result<(), DbError>;

    /// Insert all documents as one batch and return how many were inserted.
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize, DbError>;

    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64, DbError>;

    /// Create a single-field index and return its name. Creating an identical
    /// index again is a no-op.
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<String, DbError>;

    /// Key documents of every index on the collection, `_id` included.
    async fn index_keys(&self, collection: &str) -> Result<Vec<Document>, DbError>;

    async fn user_exists(&self, username: &str) -> Result<bool, DbError>;

    /// Fails with [`DbError::UserExists`] if the user is already defined.
    async fn create_user(&self, user: &NewUser) -> Result<(), DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_command_carries_scoped_roles() {
        let user = NewUser {
            username: "stud".to_string(),
            password: "stud".to_string(),
            roles: vec![RoleGrant::new("readWrite", "delivery_db")],
        };

        let command = user.create_command();
        assert_eq!(command.get_str("createUser").unwrap(), "stud");
        assert_eq!(command.get_str("pwd").unwrap(), "stud");

        let roles = command.get_array("roles").unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(
            roles[0],
            Bson::Document(doc! { "role": "readWrite", "db": "delivery_db" })
        );
    }

    #[test]
    fn debug_output_hides_password() {
        let user = NewUser {
            username: "stud".to_string(),
            password: "topsecret".to_string(),
            roles: vec![],
        };
        assert!(!format!("{:?}", user).contains("topsecret"));
    }

    #[test]
    fn index_keys_and_names_follow_server_conventions() {
        let spec = IndexSpec::ascending("user_id");
        assert_eq!(index_keys(&spec), doc! { "user_id": 1 });
        assert_eq!(index_name(&spec), "user_id_1");
    }
}
