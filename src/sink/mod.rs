pub mod jsonl;

use crate::pipeline::mapper::OutputRecord;
use async_trait::async_trait;
use thiserror::Error;

pub use jsonl::JsonLinesSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Downstream destination for record batches.
///
/// A successful `write_batch` means every record of the batch was delivered;
/// checkpoints are only committed after that.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn write_batch(&self, records: &[OutputRecord]) -> Result<(), SinkError>;
}
