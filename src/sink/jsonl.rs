use super::{RecordSink, SinkError};
use crate::pipeline::mapper::OutputRecord;
use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes one JSON object per record, flushing after every batch.
pub struct JsonLinesSink {
    writer: Mutex<BoxedWriter>,
}

impl JsonLinesSink {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }

    /// Opens `path` for appending, creating it and its parent directory.
    pub async fn append_to(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self::new(file))
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn write_batch(&self, records: &[OutputRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::with_capacity(records.len() * 128);
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(&buffer).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mapper::map_event;
    use crate::source::types::{OutputEvent, SourcePartitionKey};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_appends_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("records.jsonl");
        let partition = SourcePartitionKey::stream("/app", "web");

        let sink = JsonLinesSink::append_to(&path).await.unwrap();
        sink.write_batch(&[
            map_event(&OutputEvent::new(1, "first"), &partition, "app"),
            map_event(&OutputEvent::new(2, "second"), &partition, "app"),
        ])
        .await
        .unwrap();
        sink.write_batch(&[map_event(&OutputEvent::new(3, "third"), &partition, "app")])
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["value"], "first");
        assert_eq!(lines[2]["source_offset"]["timestamp"], 3);
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl");
        let sink = JsonLinesSink::append_to(&path).await.unwrap();
        sink.write_batch(&[]).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
