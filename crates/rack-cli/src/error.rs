use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] rack_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No item name provided")]
    EmptyName,
    #[error("Item ID cannot be empty")]
    EmptyItemId,
    #[error("Item not found for id/prefix: {0}")]
    ItemNotFound(String),
    #[error("{0}")]
    AmbiguousItemId(String),
    #[error("No conflict for {0}; it is already in sync")]
    NoConflict(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Set RACK_FIREBASE_PROJECT_ID, RACK_FIREBASE_API_KEY and RACK_SYNC_ID."
    )]
    SyncNotConfigured,
}
