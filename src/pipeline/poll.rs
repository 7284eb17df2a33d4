use super::clock::Clock;
use super::error::{Result, SourceError};
use super::mapper::{derive_topic, map_event, OutputRecord};
use super::window::{StartPolicy, WindowTracker};
use crate::config::types::{PartitionScheme, SourceConfig};
use crate::config::validate_source;
use crate::source::resolver::StreamResolver;
use crate::source::traits::{FetchRequest, LogReader, StreamLister};
use crate::source::types::{OutputEvent, ResolvedStream, SourcePartitionKey};
use crate::storage::traits::CheckpointStore;
use std::sync::Arc;
use tracing::{debug, trace};

/// Empty pages that still carry a continuation token are followed without
/// counting against `max_pages`, up to this many per cycle.
const MAX_EMPTY_PAGES: usize = 16;

/// Polling engine for one source.
///
/// Each call to [`PollCycle::run`] resolves the stream to read (when
/// stream-level), works out the request window from the tracked cursor,
/// fetches it and maps the events into records. The cursor only moves after
/// every page of the cycle was fetched, so a failed cycle leaves it where it
/// was and the next cycle retries the same window.
pub struct PollCycle {
    source_id: String,
    log_group: String,
    scheme: PartitionScheme,
    follow_latest: bool,
    configured_stream: Option<String>,
    topic: String,
    max_pages: usize,
    page_limit: Option<i32>,

    resolver: StreamResolver,
    resolved: Option<ResolvedStream>,
    window: WindowTracker,

    reader: Arc<dyn LogReader>,
    store: Arc<dyn CheckpointStore>,
    clock: Arc<dyn Clock>,
}

impl PollCycle {
    pub fn new(
        source_id: &str,
        config: &SourceConfig,
        reader: Arc<dyn LogReader>,
        lister: Arc<dyn StreamLister>,
        store: Arc<dyn CheckpointStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let errors = validate_source(source_id, config);
        if !errors.is_empty() {
            return Err(SourceError::Configuration(errors.join("; ")));
        }

        let policy = match config.partition {
            PartitionScheme::Stream => StartPolicy::Backfill,
            PartitionScheme::Group => StartPolicy::Lookback(config.lookback),
        };

        let topic = config
            .topic
            .clone()
            .unwrap_or_else(|| derive_topic(&config.log_group));

        Ok(Self {
            source_id: source_id.to_string(),
            log_group: config.log_group.clone(),
            scheme: config.partition,
            follow_latest: config.follow_latest,
            configured_stream: config.log_stream.clone(),
            topic,
            max_pages: config.max_pages,
            page_limit: config.page_limit,
            resolver: StreamResolver::new(lister),
            resolved: None,
            window: WindowTracker::new(policy),
            reader,
            store,
            clock,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn resolved_stream(&self) -> Option<&ResolvedStream> {
        self.resolved.as_ref()
    }

    pub fn partition(&self) -> Option<&SourcePartitionKey> {
        self.window.partition()
    }

    /// Inclusive start of the next request window, once known.
    pub fn cursor(&self) -> Option<i64> {
        self.window.cursor()
    }

    /// Runs one poll cycle. An empty batch means no new events.
    pub async fn run(&mut self) -> Result<Vec<OutputRecord>> {
        let now = self.clock.now_millis();
        let (partition, start_time) = self.prepare_window(now).await?;

        if start_time >= now {
            trace!(
                source_id = %self.source_id,
                start_time,
                now,
                "Window start is not in the past, skipping fetch"
            );
            return Ok(Vec::new());
        }

        let mut events: Vec<OutputEvent> = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages_with_events = 0usize;
        let mut empty_pages = 0usize;

        let truncated = loop {
            let request = FetchRequest {
                partition: partition.clone(),
                start_time,
                end_time: now,
                next_token: next_token.take(),
                limit: self.page_limit,
            };

            let page = self
                .reader
                .fetch_events(&request)
                .await
                .map_err(|source| SourceError::Fetch {
                    target: partition.to_string(),
                    source,
                })?;

            trace!(
                source_id = %self.source_id,
                partition = %partition,
                start_time,
                end_time = now,
                events = page.events.len(),
                has_more = page.next_token.is_some(),
                "Fetched page"
            );

            if page.events.is_empty() {
                empty_pages += 1;
            } else {
                pages_with_events += 1;
            }
            events.extend(page.events);

            let Some(token) = page.next_token else {
                break false;
            };
            if empty_pages >= MAX_EMPTY_PAGES {
                break true;
            }
            // A batch within a single millisecond cannot be cut, keep paging
            if pages_with_events >= self.max_pages && !single_timestamp(&events) {
                break true;
            }
            next_token = Some(token);
        };

        if truncated {
            let held_back = hold_back_last_timestamp(&mut events);
            if held_back > 0 {
                debug!(
                    source_id = %self.source_id,
                    partition = %partition,
                    held_back,
                    "Page ended inside a millisecond, deferring its events to the next cycle"
                );
            }
        }

        let mut records = Vec::with_capacity(events.len());
        for event in &events {
            records.push(map_event(event, &partition, &self.topic));
            self.window.advance(event);
        }

        if !records.is_empty() {
            debug!(
                source_id = %self.source_id,
                partition = %partition,
                records = records.len(),
                cursor = ?self.window.cursor(),
                "Poll cycle produced records"
            );
        }

        Ok(records)
    }

    /// Settles the partition for this cycle and returns it with the window
    /// start. Restarts the tracker from the store whenever the partition
    /// changes (first cycle, or the latest stream moved on).
    async fn prepare_window(&mut self, now: i64) -> Result<(SourcePartitionKey, i64)> {
        let partition = match self.scheme {
            PartitionScheme::Group => SourcePartitionKey::group(&self.log_group),
            PartitionScheme::Stream => {
                let stream = self.current_stream().await?;
                SourcePartitionKey::stream(&self.log_group, stream)
            }
        };

        if self.window.is_started_for(&partition) {
            if let Some(cursor) = self.window.cursor() {
                return Ok((partition, cursor));
            }
        }

        let cursor = self
            .window
            .start(&partition, self.store.as_ref(), now)
            .await?;
        Ok((partition, cursor))
    }

    async fn current_stream(&mut self) -> Result<String> {
        if let Some(resolved) = &self.resolved {
            let stale = self.follow_latest
                && self
                    .window
                    .cursor()
                    .is_some_and(|cursor| resolved.is_stale(cursor));
            if !stale {
                return Ok(resolved.name.clone());
            }

            debug!(
                source_id = %self.source_id,
                log_stream = %resolved.name,
                last_event_timestamp = resolved.last_event_timestamp,
                cursor = ?self.window.cursor(),
                "Resolved stream is stale, re-resolving"
            );
        }

        let current = self
            .resolved
            .as_ref()
            .map(|resolved| resolved.name.as_str())
            .or(self.configured_stream.as_deref());

        let resolved = self
            .resolver
            .resolve(&self.log_group, self.follow_latest, current, self.clock.now())
            .await?;

        let name = resolved.name.clone();
        self.resolved = Some(resolved);
        Ok(name)
    }
}

fn single_timestamp(events: &[OutputEvent]) -> bool {
    match (events.first(), events.last()) {
        (Some(first), Some(last)) => first.timestamp == last.timestamp,
        _ => false,
    }
}

/// Drops the trailing events that share the last event's timestamp, since
/// more of that millisecond may sit on the unread page. Returns how many
/// were dropped.
fn hold_back_last_timestamp(events: &mut Vec<OutputEvent>) -> usize {
    let Some(last) = events.last().map(|event| event.timestamp) else {
        return 0;
    };
    let keep = events
        .iter()
        .rposition(|event| event.timestamp != last)
        .map_or(0, |index| index + 1);
    let held_back = events.len() - keep;
    events.truncate(keep);
    held_back
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::traits::{EventPage, FetchError};
    use crate::source::types::StreamSummary;
    use crate::storage::memory::MemoryCheckpointStore;
    use async_trait::async_trait;
    use std::result::Result;
    use std::sync::Mutex;

    const NOW: i64 = 1_000_000;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            NOW
        }
    }

    /// Serves pages in order; every page but the last carries a token.
    struct ScriptedReader {
        pages: Mutex<Vec<Vec<OutputEvent>>>,
        calls: Mutex<usize>,
        fail_after: Option<usize>,
    }

    impl ScriptedReader {
        fn new(pages: Vec<Vec<OutputEvent>>) -> Self {
            Self {
                pages: Mutex::new(pages),
                calls: Mutex::new(0),
                fail_after: None,
            }
        }

        /// Serves `successful` pages, then fails every further request.
        fn failing_after(pages: Vec<Vec<OutputEvent>>, successful: usize) -> Self {
            Self {
                fail_after: Some(successful),
                ..Self::new(pages)
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LogReader for ScriptedReader {
        async fn fetch_events(&self, _request: &FetchRequest) -> Result<EventPage, FetchError> {
            let calls = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if self.fail_after.is_some_and(|successful| calls > successful) {
                return Err(FetchError::Timeout);
            }

            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(EventPage::default());
            }
            let events = pages.remove(0);
            let next_token = (!pages.is_empty()).then(|| "more".to_string());
            Ok(EventPage { events, next_token })
        }
    }

    #[async_trait]
    impl StreamLister for ScriptedReader {
        async fn list_streams_by_recency(
            &self,
            _log_group: &str,
            _limit: i32,
        ) -> Result<Vec<StreamSummary>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn group_cycle(reader: Arc<ScriptedReader>, max_pages: usize) -> PollCycle {
        let mut config = SourceConfig::for_group("us-east-1", "/app");
        config.max_pages = max_pages;
        PollCycle::new(
            "app",
            &config,
            reader.clone(),
            reader,
            Arc::new(MemoryCheckpointStore::new()),
            Arc::new(FixedClock),
        )
        .unwrap()
    }

    fn values(records: &[OutputRecord]) -> Vec<&str> {
        records.iter().map(|record| record.value.as_str()).collect()
    }

    #[tokio::test]
    async fn test_single_page_by_default() {
        let reader = Arc::new(ScriptedReader::new(vec![
            vec![OutputEvent::new(900_000, "a"), OutputEvent::new(900_001, "b")],
            vec![OutputEvent::new(900_001, "c")],
        ]));
        let mut cycle = group_cycle(reader.clone(), 1);

        let records = cycle.run().await.unwrap();
        assert_eq!(reader.calls(), 1);
        // "b" shares its millisecond with the unread page
        assert_eq!(values(&records), vec!["a"]);
        assert_eq!(cycle.cursor(), Some(900_001));
    }

    #[tokio::test]
    async fn test_max_pages_follows_tokens() {
        let reader = Arc::new(ScriptedReader::new(vec![
            vec![OutputEvent::new(900_000, "a"), OutputEvent::new(900_003, "b")],
            vec![OutputEvent::new(900_005, "c"), OutputEvent::new(900_006, "d")],
            vec![OutputEvent::new(900_009, "e")],
        ]));
        let mut cycle = group_cycle(reader.clone(), 2);

        let records = cycle.run().await.unwrap();
        assert_eq!(reader.calls(), 2);
        assert_eq!(values(&records), vec!["a", "b", "c"]);
        assert_eq!(cycle.cursor(), Some(900_006));
    }

    #[tokio::test]
    async fn test_last_page_is_taken_whole() {
        let reader = Arc::new(ScriptedReader::new(vec![vec![
            OutputEvent::new(900_000, "a"),
            OutputEvent::new(900_004, "b"),
            OutputEvent::new(900_004, "c"),
        ]]));
        let mut cycle = group_cycle(reader.clone(), 1);

        let records = cycle.run().await.unwrap();
        assert_eq!(values(&records), vec!["a", "b", "c"]);
        assert_eq!(cycle.cursor(), Some(900_005));
    }

    #[tokio::test]
    async fn test_single_millisecond_batch_keeps_paging() {
        let reader = Arc::new(ScriptedReader::new(vec![
            vec![OutputEvent::new(900_000, "a"), OutputEvent::new(900_000, "b")],
            vec![OutputEvent::new(900_000, "c"), OutputEvent::new(900_007, "d")],
            vec![OutputEvent::new(900_009, "e")],
        ]));
        let mut cycle = group_cycle(reader.clone(), 1);

        let records = cycle.run().await.unwrap();
        assert_eq!(reader.calls(), 2);
        assert_eq!(values(&records), vec!["a", "b", "c"]);
        assert_eq!(cycle.cursor(), Some(900_001));
    }

    #[tokio::test]
    async fn test_failure_on_later_page_fails_whole_cycle() {
        let reader = Arc::new(ScriptedReader::failing_after(
            vec![
                vec![OutputEvent::new(900_000, "a"), OutputEvent::new(900_000, "b")],
                vec![OutputEvent::new(900_002, "c")],
            ],
            1,
        ));
        let mut cycle = group_cycle(reader.clone(), 1);

        let err = cycle.run().await.unwrap_err();
        assert!(matches!(err, SourceError::Fetch { .. }));
        assert_eq!(reader.calls(), 2);
        assert_eq!(cycle.cursor(), Some(0));
    }

    #[test]
    fn test_hold_back_last_timestamp() {
        let mut events = vec![
            OutputEvent::new(1, "a"),
            OutputEvent::new(2, "b"),
            OutputEvent::new(2, "c"),
        ];
        assert_eq!(hold_back_last_timestamp(&mut events), 2);
        assert_eq!(events, vec![OutputEvent::new(1, "a")]);

        let mut same = vec![OutputEvent::new(5, "a"), OutputEvent::new(5, "b")];
        assert_eq!(hold_back_last_timestamp(&mut same), 2);
        assert!(same.is_empty());

        assert_eq!(hold_back_last_timestamp(&mut Vec::new()), 0);
    }

    #[tokio::test]
    async fn test_empty_pages_do_not_count_against_max_pages() {
        let reader = Arc::new(ScriptedReader::new(vec![
            Vec::new(),
            Vec::new(),
            vec![OutputEvent::new(950_000, "late")],
        ]));
        let mut cycle = group_cycle(reader.clone(), 1);

        let records = cycle.run().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(reader.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_page_budget_ends_cycle() {
        let mut pages = vec![Vec::new(); MAX_EMPTY_PAGES + 4];
        pages.push(vec![OutputEvent::new(950_000, "unreached")]);
        let reader = Arc::new(ScriptedReader::new(pages));
        let mut cycle = group_cycle(reader.clone(), 1);

        let records = cycle.run().await.unwrap();
        assert!(records.is_empty());
        assert_eq!(reader.calls(), MAX_EMPTY_PAGES);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let reader = Arc::new(ScriptedReader::new(Vec::new()));
        let mut config = SourceConfig::for_group("", "/app");
        config.max_pages = 0;

        let err = PollCycle::new(
            "broken",
            &config,
            reader.clone(),
            reader,
            Arc::new(MemoryCheckpointStore::new()),
            Arc::new(FixedClock),
        )
        .err()
        .unwrap();

        assert!(matches!(err, SourceError::Configuration(_)));
        assert!(err.is_fatal());
    }
}
