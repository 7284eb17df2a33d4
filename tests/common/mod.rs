#![allow(dead_code)]

use async_trait::async_trait;
use cwsource::pipeline::Clock;
use cwsource::source::{
    EventPage, FetchError, FetchRequest, LogReader, OutputEvent, SourcePartitionKey,
    StreamLister, StreamSummary,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

/// Clock the test moves by hand.
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn at(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// One call made against the fake service, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List { log_group: String, limit: i32 },
    Fetch { partition: SourcePartitionKey, start_time: i64, end_time: i64 },
}

/// In-memory log service.
///
/// Events are stored per partition and served for `[start_time, end_time)`,
/// in one page unless a page size is set. The stream list is returned as given, so tests order it
/// most recent first.
#[derive(Default)]
pub struct FakeLogService {
    events: Mutex<HashMap<SourcePartitionKey, Vec<OutputEvent>>>,
    streams: Mutex<HashMap<String, Vec<StreamSummary>>>,
    calls: Mutex<Vec<Call>>,
    fail_fetch: AtomicBool,
    page_size: Mutex<Option<usize>>,
    fail_after: Mutex<Option<usize>>,
}

impl FakeLogService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_events(&self, partition: SourcePartitionKey, events: Vec<OutputEvent>) {
        let mut all = self.events.lock().unwrap();
        let stored = all.entry(partition).or_default();
        stored.extend(events);
        stored.sort_by_key(|event| event.timestamp);
    }

    pub fn set_streams(&self, log_group: &str, streams: &[(&str, i64)]) {
        let summaries = streams
            .iter()
            .map(|(name, last_event_timestamp)| StreamSummary {
                name: name.to_string(),
                last_event_timestamp: *last_event_timestamp,
            })
            .collect();
        self.streams
            .lock()
            .unwrap()
            .insert(log_group.to_string(), summaries);
    }

    /// Splits results into pages of `size`, continued through an offset token.
    pub fn set_page_size(&self, size: usize) {
        *self.page_size.lock().unwrap() = Some(size);
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
        *self.fail_after.lock().unwrap() = None;
    }

    /// Serves `successful` more fetches, then fails until reset.
    pub fn fail_fetches_after(&self, successful: usize) {
        let made = self.fetch_calls().len();
        *self.fail_after.lock().unwrap() = Some(made + successful);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetch_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Fetch { .. }))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl LogReader for FakeLogService {
    async fn fetch_events(&self, request: &FetchRequest) -> Result<EventPage, FetchError> {
        self.calls.lock().unwrap().push(Call::Fetch {
            partition: request.partition.clone(),
            start_time: request.start_time,
            end_time: request.end_time,
        });

        let fetches = self.fetch_calls().len();
        let over_budget = self
            .fail_after
            .lock()
            .unwrap()
            .is_some_and(|limit| fetches > limit);
        if over_budget || self.fail_fetch.load(Ordering::SeqCst) {
            return Err(FetchError::Service("service unavailable".to_string()));
        }

        let matching: Vec<OutputEvent> = self
            .events
            .lock()
            .unwrap()
            .get(&request.partition)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.timestamp >= request.start_time && e.timestamp < request.end_time)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let Some(size) = *self.page_size.lock().unwrap() else {
            return Ok(EventPage {
                events: matching,
                next_token: None,
            });
        };

        let offset: usize = request
            .next_token
            .as_deref()
            .map(|token| token.parse().unwrap())
            .unwrap_or(0);
        let end = (offset + size).min(matching.len());
        Ok(EventPage {
            events: matching[offset.min(end)..end].to_vec(),
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }
}

#[async_trait]
impl StreamLister for FakeLogService {
    async fn list_streams_by_recency(
        &self,
        log_group: &str,
        limit: i32,
    ) -> Result<Vec<StreamSummary>, FetchError> {
        self.calls.lock().unwrap().push(Call::List {
            log_group: log_group.to_string(),
            limit,
        });

        let streams = self.streams.lock().unwrap();
        Ok(streams
            .get(log_group)
            .map(|streams| streams.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }
}
