//! Error types for the policy sync subsystem.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("bundle fetch error: {0}")]
    FetchError(String),

    #[error("invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("sync target not configured")]
    NotConfigured,

    #[error("vault error: {0}")]
    VaultError(String),

    #[error("deserialization error: {0}")]
    DeserializeError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
