use super::error::SourceError;
use super::mapper::OutputRecord;
use super::task::SourceTask;
use crate::config::types::PollConfig;
use crate::sink::RecordSink;
use crate::source::types::SourcePartitionKey;
use crate::storage::checkpoint::Checkpoint;
use crate::storage::traits::{CheckpointStore, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source '{source_id}' stopped: {error}")]
    Source {
        source_id: String,
        #[source]
        error: SourceError,
    },
}

/// Counters for one source run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub records: u64,
}

/// Host loop for one started source.
///
/// Each successful cycle's batch goes to the sink first; only once the sink
/// accepted it are the checkpoints committed. A non-empty batch is followed
/// by another cycle straight away so a backlog drains, an empty one by
/// `poll.interval`. Failed cycles back off exponentially. Fatal errors end
/// the loop, as does `cancel`, which is only checked between cycles.
pub async fn run_source(
    mut task: SourceTask,
    sink: Arc<dyn RecordSink>,
    store: Arc<dyn CheckpointStore>,
    poll: PollConfig,
    cancel: CancellationToken,
) -> Result<RunStats, PipelineError> {
    let source_id = task.source_id().to_string();
    let mut stats = RunStats::default();
    let mut backoff = poll.retry_backoff;

    info!(source_id = %source_id, "Source loop started");

    let outcome = loop {
        if cancel.is_cancelled() {
            break Ok(());
        }

        let delay = match task.run().await {
            Ok(records) if records.is_empty() => {
                stats.cycles += 1;
                backoff = poll.retry_backoff;
                poll.interval
            }
            Ok(records) => {
                stats.cycles += 1;
                backoff = poll.retry_backoff;

                if !deliver(sink.as_ref(), &records, &poll, &cancel).await {
                    // Cancelled before delivery: nothing committed, a restart
                    // resumes from the last committed checkpoint
                    break Ok(());
                }
                stats.records += records.len() as u64;

                if let Err(e) = commit_checkpoints(store.as_ref(), &records).await {
                    error!(
                        source_id = %source_id,
                        error = %e,
                        "Failed to commit checkpoint, will retry with the next batch"
                    );
                }
                Duration::ZERO
            }
            Err(e) if e.is_fatal() => {
                error!(source_id = %source_id, error = %e, "Fatal source error");
                break Err(PipelineError::Source {
                    source_id: source_id.clone(),
                    error: e,
                });
            }
            Err(e) => {
                stats.failed_cycles += 1;
                warn!(
                    source_id = %source_id,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Poll cycle failed, retrying"
                );
                let delay = backoff;
                backoff = std::cmp::min(backoff * 2, poll.max_backoff);
                delay
            }
        };

        if delay.is_zero() {
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            _ = tokio::time::sleep(delay) => {}
        }
    };

    task.stop();
    info!(
        source_id = %source_id,
        cycles = stats.cycles,
        failed_cycles = stats.failed_cycles,
        records = stats.records,
        "Source loop finished"
    );

    outcome.map(|()| stats)
}

/// Writes `records` to the sink, retrying with backoff until it succeeds.
/// Returns false if cancelled first.
async fn deliver(
    sink: &dyn RecordSink,
    records: &[OutputRecord],
    poll: &PollConfig,
    cancel: &CancellationToken,
) -> bool {
    let mut backoff = poll.retry_backoff;
    loop {
        match sink.write_batch(records).await {
            Ok(()) => return true,
            Err(e) => warn!(
                records = records.len(),
                backoff_ms = backoff.as_millis() as u64,
                error = %e,
                "Sink write failed, retrying"
            ),
        }

        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = std::cmp::min(backoff * 2, poll.max_backoff);
    }
}

/// Persists the highest record offset of every partition in `records`.
/// Returns the number of partitions committed.
pub async fn commit_checkpoints(
    store: &dyn CheckpointStore,
    records: &[OutputRecord],
) -> Result<usize, StorageError> {
    let mut latest: HashMap<&SourcePartitionKey, Checkpoint> = HashMap::new();
    for record in records {
        latest
            .entry(&record.source_partition)
            .and_modify(|checkpoint| *checkpoint = (*checkpoint).max(record.source_offset))
            .or_insert(record.source_offset);
    }

    for (partition, checkpoint) in &latest {
        store.put(partition, *checkpoint).await?;
        debug!(
            partition = %partition,
            timestamp = checkpoint.timestamp,
            "Committed checkpoint"
        );
    }

    Ok(latest.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mapper::map_event;
    use crate::source::types::OutputEvent;
    use crate::storage::memory::MemoryCheckpointStore;

    #[tokio::test]
    async fn test_commit_keeps_highest_offset_per_partition() {
        let store = MemoryCheckpointStore::new();
        let web = SourcePartitionKey::stream("/app", "web");
        let api = SourcePartitionKey::stream("/app", "api");

        let records = vec![
            map_event(&OutputEvent::new(10, "a"), &web, "app"),
            map_event(&OutputEvent::new(30, "b"), &web, "app"),
            map_event(&OutputEvent::new(20, "c"), &api, "app"),
        ];

        let committed = commit_checkpoints(&store, &records).await.unwrap();
        assert_eq!(committed, 2);
        assert_eq!(store.checkpoint(&web), Some(Checkpoint::new(30)));
        assert_eq!(store.checkpoint(&api), Some(Checkpoint::new(20)));
    }

    #[tokio::test]
    async fn test_commit_empty_batch() {
        let store = MemoryCheckpointStore::new();
        assert_eq!(commit_checkpoints(&store, &[]).await.unwrap(), 0);
        assert!(store.is_empty());
    }
}
