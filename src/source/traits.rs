use super::types::{OutputEvent, SourcePartitionKey, StreamSummary};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("log service error: {0}")]
    Service(String),

    #[error("log service request timed out")]
    Timeout,
}

/// One page request against the remote log store.
///
/// The window is `[start_time, end_time)` in epoch milliseconds. The
/// partition decides whether a single stream or the whole group is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub partition: SourcePartitionKey,
    pub start_time: i64,
    pub end_time: i64,
    pub next_token: Option<String>,
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPage {
    /// Events in the order the store returned them (ascending per stream)
    pub events: Vec<OutputEvent>,
    /// Continuation token, absent when the window is exhausted
    pub next_token: Option<String>,
}

#[async_trait]
pub trait LogReader: Send + Sync {
    async fn fetch_events(&self, request: &FetchRequest) -> Result<EventPage, FetchError>;
}

#[async_trait]
pub trait StreamLister: Send + Sync {
    /// Streams of `log_group` ordered by last event time, most recent first.
    async fn list_streams_by_recency(
        &self,
        log_group: &str,
        limit: i32,
    ) -> Result<Vec<StreamSummary>, FetchError>;
}
