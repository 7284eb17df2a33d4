use super::clock::Clock;
use super::error::{Result, SourceError};
use super::mapper::OutputRecord;
use super::poll::PollCycle;
use crate::config::types::SourceConfig;
use crate::source::traits::{LogReader, StreamLister};
use crate::storage::traits::CheckpointStore;
use std::sync::Arc;
use tracing::info;

/// Handles to the remote log service used by one task.
#[derive(Clone)]
pub struct SourceClients {
    pub reader: Arc<dyn LogReader>,
    pub lister: Arc<dyn StreamLister>,
}

impl SourceClients {
    /// Both roles served by one client.
    pub fn shared<C>(client: Arc<C>) -> Self
    where
        C: LogReader + StreamLister + 'static,
    {
        Self {
            reader: client.clone(),
            lister: client,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Idle,
    Polling,
    Stopped,
}

impl TaskStatus {
    fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Polling => "polling",
            TaskStatus::Stopped => "stopped",
        }
    }
}

enum TaskState {
    Idle,
    Polling(Box<PollCycle>),
    Stopped,
}

/// Host-facing lifecycle of a single source: `Idle -> Polling -> Stopped`.
///
/// Dropping the poll cycle on `stop` (or when the task itself is dropped)
/// releases the client handles it holds.
pub struct SourceTask {
    source_id: String,
    state: TaskState,
}

impl SourceTask {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            state: TaskState::Idle,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn status(&self) -> TaskStatus {
        match self.state {
            TaskState::Idle => TaskStatus::Idle,
            TaskState::Polling(_) => TaskStatus::Polling,
            TaskState::Stopped => TaskStatus::Stopped,
        }
    }

    /// Validates `config` and prepares the poll cycle. No I/O happens here;
    /// on a configuration error the task stays idle.
    pub fn start(
        &mut self,
        config: &SourceConfig,
        clients: SourceClients,
        store: Arc<dyn CheckpointStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<()> {
        if self.status() != TaskStatus::Idle {
            return Err(self.invalid_state(TaskStatus::Idle));
        }

        let cycle = PollCycle::new(
            &self.source_id,
            config,
            clients.reader,
            clients.lister,
            store,
            clock,
        )?;

        info!(
            source_id = %self.source_id,
            log_group = %config.log_group,
            partition = ?config.partition,
            follow_latest = config.follow_latest,
            topic = %cycle.topic(),
            "Source task started"
        );

        self.state = TaskState::Polling(Box::new(cycle));
        Ok(())
    }

    pub async fn run(&mut self) -> Result<Vec<OutputRecord>> {
        if let TaskState::Polling(cycle) = &mut self.state {
            return cycle.run().await;
        }
        Err(self.invalid_state(TaskStatus::Polling))
    }

    /// Stops the task. Safe to call in any state.
    pub fn stop(&mut self) {
        if let TaskState::Polling(cycle) = &self.state {
            info!(
                source_id = %self.source_id,
                cursor = ?cycle.cursor(),
                "Source task stopped"
            );
        }
        self.state = TaskState::Stopped;
    }

    /// The running poll cycle, if any.
    pub fn cycle(&self) -> Option<&PollCycle> {
        match &self.state {
            TaskState::Polling(cycle) => Some(cycle.as_ref()),
            _ => None,
        }
    }

    fn invalid_state(&self, expected: TaskStatus) -> SourceError {
        SourceError::InvalidState {
            actual: self.status().as_str(),
            expected: expected.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::clock::SystemClock;
    use crate::source::traits::{EventPage, FetchError, FetchRequest};
    use crate::source::types::StreamSummary;
    use crate::storage::memory::MemoryCheckpointStore;
    use async_trait::async_trait;

    struct EmptyLogService;

    #[async_trait]
    impl LogReader for EmptyLogService {
        async fn fetch_events(
            &self,
            _request: &FetchRequest,
        ) -> std::result::Result<EventPage, FetchError> {
            Ok(EventPage::default())
        }
    }

    #[async_trait]
    impl StreamLister for EmptyLogService {
        async fn list_streams_by_recency(
            &self,
            _log_group: &str,
            _limit: i32,
        ) -> std::result::Result<Vec<StreamSummary>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn clients() -> SourceClients {
        SourceClients::shared(Arc::new(EmptyLogService))
    }

    fn store() -> Arc<dyn CheckpointStore> {
        Arc::new(MemoryCheckpointStore::new())
    }

    #[tokio::test]
    async fn test_run_before_start_is_rejected() {
        let mut task = SourceTask::new("app");
        let err = task.run().await.unwrap_err();
        assert!(matches!(
            err,
            SourceError::InvalidState {
                actual: "idle",
                expected: "polling"
            }
        ));
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let mut task = SourceTask::new("app");
        assert_eq!(task.status(), TaskStatus::Idle);

        let config = SourceConfig::for_stream("us-east-1", "/app/service", "web");
        task.start(&config, clients(), store(), Arc::new(SystemClock))
            .unwrap();
        assert_eq!(task.status(), TaskStatus::Polling);
        assert_eq!(task.cycle().map(|c| c.topic()), Some("app.service"));

        let batch = task.run().await.unwrap();
        assert!(batch.is_empty());

        task.stop();
        assert_eq!(task.status(), TaskStatus::Stopped);
        assert!(task.cycle().is_none());
        assert!(task.run().await.is_err());

        // Idempotent
        task.stop();
        assert_eq!(task.status(), TaskStatus::Stopped);
    }

    #[test]
    fn test_configuration_error_keeps_task_idle() {
        let mut task = SourceTask::new("app");
        let mut config = SourceConfig::for_stream("us-east-1", "/app/service", "web");
        config.log_stream = None;

        let err = task
            .start(&config, clients(), store(), Arc::new(SystemClock))
            .unwrap_err();
        assert!(matches!(err, SourceError::Configuration(_)));
        assert_eq!(task.status(), TaskStatus::Idle);
    }

    #[test]
    fn test_cannot_restart_stopped_task() {
        let mut task = SourceTask::new("app");
        task.stop();
        let config = SourceConfig::for_stream("us-east-1", "/app/service", "web");
        let err = task
            .start(&config, clients(), store(), Arc::new(SystemClock))
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidState { .. }));
    }
}
