use super::error::{Result, SourceError};
use crate::source::types::{OutputEvent, SourcePartitionKey};
use crate::storage::checkpoint::Checkpoint;
use crate::storage::traits::CheckpointStore;
use std::time::Duration;
use tracing::{debug, info};

/// Where a partition starts when nothing has been checkpointed for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPolicy {
    /// Epoch zero, reading the full history
    Backfill,
    /// `now - lookback`
    Lookback(Duration),
}

impl StartPolicy {
    fn initial_cursor(self, now_millis: i64) -> i64 {
        match self {
            StartPolicy::Backfill => 0,
            StartPolicy::Lookback(lookback) => {
                let lookback_ms = i64::try_from(lookback.as_millis()).unwrap_or(i64::MAX);
                now_millis.saturating_sub(lookback_ms).max(0)
            }
        }
    }
}

/// Tracks the inclusive start of the next request window for one partition.
#[derive(Debug)]
pub struct WindowTracker {
    policy: StartPolicy,
    partition: Option<SourcePartitionKey>,
    cursor: i64,
}

impl WindowTracker {
    pub fn new(policy: StartPolicy) -> Self {
        Self {
            policy,
            partition: None,
            cursor: 0,
        }
    }

    /// Loads the cursor for `partition` from the checkpoint store.
    ///
    /// A stored checkpoint is the inclusive start of the next window. A
    /// stored value that is not an integer timestamp is an error and leaves
    /// the tracker untouched.
    pub async fn start(
        &mut self,
        partition: &SourcePartitionKey,
        store: &dyn CheckpointStore,
        now_millis: i64,
    ) -> Result<i64> {
        let stored = store.get(partition).await?;
        let checkpoint = match stored.as_ref().map(Checkpoint::from_value) {
            Some(Ok(checkpoint)) => checkpoint,
            Some(Err(found)) => {
                return Err(SourceError::CheckpointType {
                    partition: partition.to_string(),
                    found,
                })
            }
            None => None,
        };

        let cursor = match checkpoint {
            Some(checkpoint) => {
                info!(
                    partition = %partition,
                    timestamp = checkpoint.timestamp,
                    "Resuming from checkpoint"
                );
                checkpoint.timestamp
            }
            None => {
                let cursor = self.policy.initial_cursor(now_millis);
                info!(
                    partition = %partition,
                    start_time = cursor,
                    policy = ?self.policy,
                    "No checkpoint found, starting from policy default"
                );
                cursor
            }
        };

        self.partition = Some(partition.clone());
        self.cursor = cursor;
        Ok(cursor)
    }

    /// Moves the cursor past `event`. The cursor never moves backwards.
    pub fn advance(&mut self, event: &OutputEvent) {
        let next = event.timestamp.saturating_add(1);
        if next > self.cursor {
            self.cursor = next;
        } else {
            debug!(
                timestamp = event.timestamp,
                cursor = self.cursor,
                "Event at or behind cursor, not moving it"
            );
        }
    }

    pub fn is_started_for(&self, partition: &SourcePartitionKey) -> bool {
        self.partition.as_ref() == Some(partition)
    }

    pub fn partition(&self) -> Option<&SourcePartitionKey> {
        self.partition.as_ref()
    }

    /// Inclusive start of the next request window, once started.
    pub fn cursor(&self) -> Option<i64> {
        self.partition.as_ref().map(|_| self.cursor)
    }
}
