use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl ForgeError {
    /// Returns `true` when the error is caused by the request rather than the
    /// system (missing records, stale preconditions, access checks). These map
    /// to 4xx responses; everything else is a 5xx.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Precondition(_) | Self::PermissionDenied(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
