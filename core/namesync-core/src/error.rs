//! Error types for namesync-core.
//!
//! None of these reach the host as faults: the command and event handlers turn
//! them into session messages and log entries.

use std::path::PathBuf;

use crate::types::AccountId;

/// Failures reported by the credential store or the account table.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("account query failed: {0}")]
    Query(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),

    #[error("account {0} not found")]
    AccountNotFound(AccountId),
}

/// Why an account rename did not happen.
#[derive(Debug, thiserror::Error)]
pub enum RenameError {
    #[error("An account with that name already exists!")]
    NameTaken { name: String, owner: AccountId },

    #[error("Failed to update account: {0}")]
    Persistence(#[source] StoreError),
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeNotFound,

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {details}")]
    Parse { path: PathBuf, details: String },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<ConfigError> for String {
    fn from(err: ConfigError) -> String {
        err.to_string()
    }
}
