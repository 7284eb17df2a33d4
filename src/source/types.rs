use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key under which ingestion progress is checkpointed.
///
/// A running source uses exactly one of the two schemes. Group-level keys
/// track a single watermark across every stream of the group, stream-level
/// keys track one watermark per concrete stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourcePartitionKey {
    // Listed first so untagged deserialization prefers the two-field form
    Stream {
        #[serde(rename = "logGroup")]
        log_group: String,
        #[serde(rename = "logStream")]
        log_stream: String,
    },
    Group {
        #[serde(rename = "logGroup")]
        log_group: String,
    },
}

impl SourcePartitionKey {
    pub fn group(log_group: impl Into<String>) -> Self {
        Self::Group {
            log_group: log_group.into(),
        }
    }

    pub fn stream(log_group: impl Into<String>, log_stream: impl Into<String>) -> Self {
        Self::Stream {
            log_group: log_group.into(),
            log_stream: log_stream.into(),
        }
    }

    /// Flat identifier used by checkpoint stores. Neither group nor stream
    /// names may contain ':' so the encoding is unambiguous.
    pub fn storage_id(&self) -> String {
        match self {
            Self::Group { log_group } => log_group.clone(),
            Self::Stream {
                log_group,
                log_stream,
            } => format!("{}:{}", log_group, log_stream),
        }
    }
}

impl fmt::Display for SourcePartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group { log_group } => write!(f, "group {}", log_group),
            Self::Stream {
                log_group,
                log_stream,
            } => write!(f, "stream {} in {}", log_stream, log_group),
        }
    }
}

/// A single event as returned by the remote log store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub message: Option<String>,
}

impl OutputEvent {
    pub fn new(timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: Some(message.into()),
        }
    }
}

/// Entry of a "streams by recency" listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub name: String,
    pub last_event_timestamp: i64,
}

/// The stream a source is currently reading. Held in memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub name: String,
    pub last_event_timestamp: i64,
    pub resolved_at: DateTime<Utc>,
}

impl ResolvedStream {
    /// True once everything the stream was known to hold has been requested,
    /// which means a newer stream may have taken over.
    pub fn is_stale(&self, cursor: i64) -> bool {
        self.last_event_timestamp <= cursor
    }
}
