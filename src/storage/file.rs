use super::checkpoint::{advances, Checkpoint};
use super::traits::{CheckpointStore, StorageError};
use crate::source::types::SourcePartitionKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointDocument {
    version: u32,
    entries: BTreeMap<String, StoredOffset>,
}

impl Default for CheckpointDocument {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredOffset {
    partition: SourcePartitionKey,
    // Kept raw so a corrupted entry reaches the engine as-is
    offset: Value,
}

/// Checkpoint store backed by a single JSON document.
///
/// The document is read on first access and rewritten on every `put` by
/// writing a sibling temp file and renaming it over the original, so a
/// crash mid-write leaves the previous document intact.
pub struct FileCheckpointStore {
    path: PathBuf,
    document: Mutex<Option<CheckpointDocument>>,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<CheckpointDocument, StorageError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.path.display(),
                    "No checkpoint file found, starting empty"
                );
                return Ok(CheckpointDocument::default());
            }
            Err(e) => return Err(e.into()),
        };

        let document: CheckpointDocument = serde_json::from_str(&contents)?;
        if document.version != CURRENT_VERSION {
            return Err(StorageError::InvalidVersion(document.version));
        }

        tracing::info!(
            path = %self.path.display(),
            partitions = document.entries.len(),
            "Loaded checkpoint file"
        );
        Ok(document)
    }

    async fn persist(&self, document: &CheckpointDocument) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        let bytes = serde_json::to_vec_pretty(document)?;
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn get(&self, partition: &SourcePartitionKey) -> Result<Option<Value>, StorageError> {
        let mut guard = self.document.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }

        Ok(guard
            .as_ref()
            .and_then(|doc| doc.entries.get(&partition.storage_id()))
            .map(|entry| entry.offset.clone()))
    }

    async fn put(
        &self,
        partition: &SourcePartitionKey,
        checkpoint: Checkpoint,
    ) -> Result<(), StorageError> {
        let mut guard = self.document.lock().await;
        let mut document = match guard.take() {
            Some(doc) => doc,
            None => self.load().await?,
        };

        let id = partition.storage_id();
        let existing = document.entries.get(&id).map(|entry| &entry.offset);
        if !advances(existing, checkpoint) {
            tracing::debug!(
                partition = %partition,
                timestamp = checkpoint.timestamp,
                "Ignoring checkpoint older than stored value"
            );
            *guard = Some(document);
            return Ok(());
        }

        let mut updated = document.clone();
        updated.entries.insert(
            id,
            StoredOffset {
                partition: partition.clone(),
                offset: checkpoint.to_value(),
            },
        );

        // Keep the in-memory copy in step with what is on disk
        match self.persist(&updated).await {
            Ok(()) => {
                *guard = Some(updated);
                Ok(())
            }
            Err(e) => {
                *guard = Some(document);
                Err(e)
            }
        }
    }
}
