use std::path::PathBuf;

use thiserror::Error;

/// Account store error types
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Username cannot be empty")]
    EmptyUsername,

    #[error("Username must be 16 characters or less (got {len})")]
    UsernameTooLong { len: usize },

    #[error("Account not found: '{identifier}'")]
    AccountNotFound { identifier: String },

    #[error("Account store at '{path}' is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize account store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to encrypt credential: {0}")]
    Encrypt(String),

    #[error("Could not determine the user's home directory")]
    HomeDirUnavailable,

    #[error("Account store is locked by another process")]
    LockUnavailable,
}

pub type Result<T> = std::result::Result<T, StoreError>;
