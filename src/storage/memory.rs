use super::checkpoint::{advances, Checkpoint};
use super::traits::{CheckpointStore, StorageError};
use crate::source::types::SourcePartitionKey;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local checkpoint store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    offsets: Mutex<HashMap<SourcePartitionKey, Value>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an arbitrary offset value, bypassing the forward-only rule.
    pub fn insert_raw(&self, partition: SourcePartitionKey, offset: Value) {
        if let Ok(mut guard) = self.offsets.lock() {
            guard.insert(partition, offset);
        }
    }

    pub fn checkpoint(&self, partition: &SourcePartitionKey) -> Option<Checkpoint> {
        let guard = self.offsets.lock().ok()?;
        guard
            .get(partition)
            .and_then(|value| Checkpoint::from_value(value).ok().flatten())
    }

    pub fn len(&self) -> usize {
        self.offsets.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, partition: &SourcePartitionKey) -> Result<Option<Value>, StorageError> {
        let guard = self
            .offsets
            .lock()
            .map_err(|_| StorageError::Io(std::io::Error::other("checkpoint map poisoned")))?;
        Ok(guard.get(partition).cloned())
    }

    async fn put(
        &self,
        partition: &SourcePartitionKey,
        checkpoint: Checkpoint,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .offsets
            .lock()
            .map_err(|_| StorageError::Io(std::io::Error::other("checkpoint map poisoned")))?;
        if advances(guard.get(partition), checkpoint) {
            guard.insert(partition.clone(), checkpoint.to_value());
        }
        Ok(())
    }
}
