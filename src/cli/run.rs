use crate::config::parse::load_config;
use crate::config::types::Config;
use crate::pipeline::{run_source, RunStats, SourceClients, SourceTask, SystemClock};
use crate::sink::{JsonLinesSink, RecordSink};
use crate::source::CloudWatchLogs;
use crate::storage::{CheckpointStore, FileCheckpointStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("source error: {0}")]
    Source(#[from] crate::pipeline::SourceError),

    #[error("sink error: {0}")]
    Sink(#[from] crate::sink::SinkError),

    #[error("no config file found; use --config <path> or run 'cwsource config init'")]
    MissingConfig,

    #[error("{failed} of {total} sources stopped with errors")]
    SourcesFailed { failed: usize, total: usize },
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), RunError> {
    let config_path = config_path.ok_or(RunError::MissingConfig)?;
    run_pipeline(&config_path).await
}

async fn run_pipeline(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let file_store = FileCheckpointStore::new(config.checkpoint.path.clone());
    info!(path = %file_store.path().display(), "Opening checkpoint store");
    let store: Arc<dyn CheckpointStore> = Arc::new(file_store);

    let sink: Arc<dyn RecordSink> = match &config.output.path {
        Some(path) => {
            info!(path = %path.display(), "Writing records to file");
            Arc::new(JsonLinesSink::append_to(path).await?)
        }
        None => Arc::new(JsonLinesSink::stdout()),
    };

    let tasks = start_tasks(&config, store.clone()).await?;
    if tasks.is_empty() {
        warn!("No sources configured, nothing to poll");
        return Ok(());
    }

    let total = tasks.len();
    let cancel = CancellationToken::new();
    let mut handles = JoinSet::new();
    for task in tasks {
        handles.spawn(run_source(
            task,
            sink.clone(),
            store.clone(),
            config.poll.clone(),
            cancel.clone(),
        ));
    }

    info!(sources = total, "Polling started, press Ctrl+C to shutdown");

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        shutdown.cancel();
    });

    let mut failed = 0;
    let mut totals = RunStats::default();
    while let Some(joined) = handles.join_next().await {
        match joined {
            Ok(Ok(stats)) => {
                totals.cycles += stats.cycles;
                totals.failed_cycles += stats.failed_cycles;
                totals.records += stats.records;
            }
            Ok(Err(e)) => {
                failed += 1;
                error!(error = %e, "Source stopped");
            }
            Err(e) => {
                failed += 1;
                error!(error = %e, "Source task join error");
            }
        }
    }

    info!(
        cycles = totals.cycles,
        failed_cycles = totals.failed_cycles,
        records = totals.records,
        "Shutdown complete"
    );

    if failed > 0 {
        return Err(RunError::SourcesFailed { failed, total });
    }
    Ok(())
}

/// Connects and starts one task per configured source, in id order.
async fn start_tasks(
    config: &Config,
    store: Arc<dyn CheckpointStore>,
) -> Result<Vec<SourceTask>, RunError> {
    let mut source_ids: Vec<&String> = config.sources.keys().collect();
    source_ids.sort();

    let clock = Arc::new(SystemClock);
    let mut tasks = Vec::with_capacity(source_ids.len());
    for source_id in source_ids {
        let source_config = &config.sources[source_id];
        let client = Arc::new(CloudWatchLogs::connect(&source_config.region).await);

        let mut task = SourceTask::new(source_id.clone());
        task.start(
            source_config,
            SourceClients::shared(client),
            store.clone(),
            clock.clone(),
        )?;
        tasks.push(task);
    }

    Ok(tasks)
}
