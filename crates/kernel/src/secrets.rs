//! Secret loading for credentials that must not live in configuration files.
//!
//! Secrets are read from a file (Docker/Kubernetes secret mounts). Values are
//! never logged; only their source and length.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to read secret '{name}' from file '{path}'")]
    Read {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("secret '{name}' from file '{path}' is empty")]
    Empty { name: String, path: PathBuf },
}

/// Load a secret from `path`, trimming surrounding whitespace left by editors
/// and `echo`.
pub fn load_file(name: &str, path: &Path) -> Result<String, SecretError> {
    debug!(secret_name = name, source = "file", path = %path.display(), "loading secret");
    let content = std::fs::read_to_string(path).map_err(|source| SecretError::Read {
        name: name.to_string(),
        path: path.to_path_buf(),
        source,
    })?;

    let trimmed = content.trim().to_string();
    if trimmed.is_empty() {
        return Err(SecretError::Empty {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }

    debug!(secret_name = name, secret = %mask_secret(&trimmed), "secret loaded from file");
    Ok(trimmed)
}

/// Masked rendering that only reveals the length.
pub fn mask_secret(secret: &str) -> String {
    format!("[SECRET:{} chars]", secret.len())
}
