use thiserror::Error;

use flagdeck_core::{FlagdeckError, ValidationError};

#[derive(Error, Debug)]
pub enum StorageError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict on {field}: {value}")]
    Conflict { field: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("{0}")]
    Other(String),
}

impl From<StorageError> for FlagdeckError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict {
                field: "tracking_key",
                value,
            } => FlagdeckError::Validation(ValidationError::DuplicateTrackingKey(value)),
            other => FlagdeckError::Internal(other.to_string()),
        }
    }
}
