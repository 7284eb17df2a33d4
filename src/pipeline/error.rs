use crate::source::traits::FetchError;
use crate::storage::traits::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no log streams found in log group '{log_group}'")]
    NoStreamFound { log_group: String },

    #[error("checkpoint for {partition} is not an integer timestamp (found {found})")]
    CheckpointType { partition: String, found: String },

    #[error("fetch failed for {target}: {source}")]
    Fetch {
        target: String,
        #[source]
        source: FetchError,
    },

    #[error("checkpoint store error: {0}")]
    Storage(#[from] StorageError),

    #[error("source task is {actual}, expected {expected}")]
    InvalidState {
        actual: &'static str,
        expected: &'static str,
    },
}

impl SourceError {
    /// Errors after which polling the same source again cannot succeed
    /// without operator intervention.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SourceError::Configuration(_)
                | SourceError::CheckpointType { .. }
                | SourceError::InvalidState { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
