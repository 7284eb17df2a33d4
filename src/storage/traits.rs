use super::checkpoint::Checkpoint;
use crate::source::types::SourcePartitionKey;
use async_trait::async_trait;

/// Durable offset storage owned by the host.
///
/// `get` hands back the raw stored offset so the engine can reject a
/// corrupted value instead of the store silently coercing it.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(
        &self,
        partition: &SourcePartitionKey,
    ) -> Result<Option<serde_json::Value>, StorageError>;

    async fn put(
        &self,
        partition: &SourcePartitionKey,
        checkpoint: Checkpoint,
    ) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("checkpoint file io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported checkpoint file version: {0}")]
    InvalidVersion(u32),
}
