use super::traits::StreamLister;
use super::types::ResolvedStream;
use crate::pipeline::error::{Result, SourceError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Picks the concrete log stream a stream-level source reads.
pub struct StreamResolver {
    lister: Arc<dyn StreamLister>,
}

impl StreamResolver {
    pub fn new(lister: Arc<dyn StreamLister>) -> Self {
        Self { lister }
    }

    /// Resolves the stream to read in `log_group`.
    ///
    /// Without `follow_latest` the configured stream is passed through
    /// unchanged and treated as never going stale. With `follow_latest` the
    /// group is asked for its most recently written stream.
    pub async fn resolve(
        &self,
        log_group: &str,
        follow_latest: bool,
        current_stream: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ResolvedStream> {
        if !follow_latest {
            let name = current_stream
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| {
                    SourceError::Configuration(format!(
                        "log group '{}': a log stream name is required when not following the latest stream",
                        log_group
                    ))
                })?;

            return Ok(ResolvedStream {
                name: name.to_string(),
                last_event_timestamp: i64::MAX,
                resolved_at: now,
            });
        }

        let streams = self
            .lister
            .list_streams_by_recency(log_group, 1)
            .await
            .map_err(|source| SourceError::Fetch {
                target: format!("group {}", log_group),
                source,
            })?;

        let latest = streams
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::NoStreamFound {
                log_group: log_group.to_string(),
            })?;

        match current_stream {
            Some(previous) if previous == latest.name => debug!(
                log_group = %log_group,
                log_stream = %latest.name,
                last_event_timestamp = latest.last_event_timestamp,
                "Latest stream unchanged"
            ),
            previous => info!(
                log_group = %log_group,
                previous = ?previous,
                log_stream = %latest.name,
                last_event_timestamp = latest.last_event_timestamp,
                "Resolved latest log stream"
            ),
        }

        Ok(ResolvedStream {
            name: latest.name,
            last_event_timestamp: latest.last_event_timestamp,
            resolved_at: now,
        })
    }
}
