use thiserror::Error;

/// Mongo server error code for `NamespaceExists`.
pub(crate) const NAMESPACE_EXISTS: i32 = 48;
/// Mongo server error code returned by `createUser` for a duplicate user.
pub(crate) const USER_ALREADY_EXISTS: i32 = 51003;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("collection '{0}' already exists")]
    CollectionExists(String),

    #[error("user '{0}' already exists")]
    UserExists(String),

    #[error("unexpected server response to '{command}': {message}")]
    UnexpectedResponse { command: &'static str, message: String },

    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
}

pub(crate) fn command_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        mongodb::error::ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}
