use crate::source::types::{OutputEvent, SourcePartitionKey};
use crate::storage::checkpoint::Checkpoint;
use serde::{Deserialize, Serialize};

/// Schema of a record value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSchema {
    String,
}

/// A log event ready for downstream delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub source_partition: SourcePartitionKey,
    /// Offset the host persists once the record is delivered
    pub source_offset: Checkpoint,
    pub topic: String,
    pub schema: ValueSchema,
    pub value: String,
    /// Event time in epoch milliseconds
    pub timestamp: i64,
}

pub fn map_event(event: &OutputEvent, partition: &SourcePartitionKey, topic: &str) -> OutputRecord {
    OutputRecord {
        source_partition: partition.clone(),
        source_offset: Checkpoint::new(event.timestamp),
        topic: topic.to_string(),
        schema: ValueSchema::String,
        value: event.message.clone().unwrap_or_default(),
        timestamp: event.timestamp,
    }
}

/// Topic name for a log group: one leading '/' dropped, every remaining '/'
/// replaced by '.'.
pub fn derive_topic(log_group: &str) -> String {
    log_group
        .strip_prefix('/')
        .unwrap_or(log_group)
        .replace('/', ".")
}
