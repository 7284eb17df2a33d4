use super::traits::{EventPage, FetchError, FetchRequest, LogReader, StreamLister};
use super::types::{OutputEvent, SourcePartitionKey, StreamSummary};
use async_trait::async_trait;
use aws_config::{meta::region::RegionProviderChain, BehaviorVersion};
use aws_sdk_cloudwatchlogs::config::Region;
use aws_sdk_cloudwatchlogs::error::{DisplayErrorContext, SdkError};
use aws_sdk_cloudwatchlogs::types::OrderBy;
use aws_sdk_cloudwatchlogs::Client;
use tracing::warn;

/// CloudWatch Logs client serving both the event reads and stream listing.
#[derive(Debug, Clone)]
pub struct CloudWatchLogs {
    client: Client,
}

impl CloudWatchLogs {
    /// Builds a client for `region`, falling back to the default provider
    /// chain when the region is not usable.
    pub async fn connect(region: &str) -> Self {
        tracing::info!(region = %region, "Creating CloudWatch Logs client");

        let region_provider = RegionProviderChain::first_try(Region::new(region.to_string()))
            .or_default_provider();

        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        Self {
            client: Client::new(&shared_config),
        }
    }

    async fn get_log_events(
        &self,
        log_group: &str,
        log_stream: &str,
        request: &FetchRequest,
    ) -> Result<EventPage, FetchError> {
        let output = self
            .client
            .get_log_events()
            .log_group_name(log_group)
            .log_stream_name(log_stream)
            .start_time(request.start_time)
            .end_time(request.end_time)
            .start_from_head(true)
            .set_next_token(request.next_token.clone())
            .set_limit(request.limit)
            .send()
            .await
            .map_err(into_fetch_error)?;

        let events = output
            .events()
            .iter()
            .filter_map(|event| to_output_event(event.timestamp(), event.message(), log_group))
            .collect();

        // The forward token repeats the request token once the stream end is reached
        let next_token = output
            .next_forward_token()
            .filter(|token| request.next_token.as_deref() != Some(*token))
            .map(str::to_string);

        Ok(EventPage { events, next_token })
    }

    async fn filter_log_events(
        &self,
        log_group: &str,
        request: &FetchRequest,
    ) -> Result<EventPage, FetchError> {
        let output = self
            .client
            .filter_log_events()
            .log_group_name(log_group)
            .start_time(request.start_time)
            .end_time(request.end_time)
            .set_next_token(request.next_token.clone())
            .set_limit(request.limit)
            .send()
            .await
            .map_err(into_fetch_error)?;

        let events = output
            .events()
            .iter()
            .filter_map(|event| to_output_event(event.timestamp(), event.message(), log_group))
            .collect();

        Ok(EventPage {
            events,
            next_token: output.next_token().map(str::to_string),
        })
    }
}

#[async_trait]
impl LogReader for CloudWatchLogs {
    async fn fetch_events(&self, request: &FetchRequest) -> Result<EventPage, FetchError> {
        match &request.partition {
            SourcePartitionKey::Stream {
                log_group,
                log_stream,
            } => self.get_log_events(log_group, log_stream, request).await,
            SourcePartitionKey::Group { log_group } => {
                self.filter_log_events(log_group, request).await
            }
        }
    }
}

#[async_trait]
impl StreamLister for CloudWatchLogs {
    async fn list_streams_by_recency(
        &self,
        log_group: &str,
        limit: i32,
    ) -> Result<Vec<StreamSummary>, FetchError> {
        let output = self
            .client
            .describe_log_streams()
            .log_group_name(log_group)
            .order_by(OrderBy::LastEventTime)
            .descending(true)
            .limit(limit)
            .send()
            .await
            .map_err(into_fetch_error)?;

        Ok(output
            .log_streams()
            .iter()
            .filter_map(|stream| {
                stream.log_stream_name().map(|name| StreamSummary {
                    name: name.to_string(),
                    last_event_timestamp: stream.last_event_timestamp().unwrap_or(0),
                })
            })
            .collect())
    }
}

fn to_output_event(
    timestamp: Option<i64>,
    message: Option<&str>,
    log_group: &str,
) -> Option<OutputEvent> {
    match timestamp {
        Some(timestamp) => Some(OutputEvent {
            timestamp,
            message: message.map(str::to_string),
        }),
        None => {
            warn!(log_group = %log_group, "Dropping log event without timestamp");
            None
        }
    }
}

fn into_fetch_error<E, R>(err: SdkError<E, R>) -> FetchError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::TimeoutError(_) => FetchError::Timeout,
        other => FetchError::Service(DisplayErrorContext(&other).to_string()),
    }
}
