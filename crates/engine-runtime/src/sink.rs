use crate::error::SinkError;
use async_trait::async_trait;
use model::records::batch::Batch;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Destination for the rows of each micro-batch.
///
/// `write_batch` must return only once the rows are handed off; the driver
/// commits the batch end right after it succeeds.
#[async_trait]
pub trait RowSink: Send {
    async fn write_batch(&mut self, batch: &Batch) -> Result<(), SinkError>;

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes one JSON object per row.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RowSink for JsonLinesSink<W> {
    async fn write_batch(&mut self, batch: &Batch) -> Result<(), SinkError> {
        let mut buf = Vec::with_capacity(batch.size_bytes() + batch.len() * 48);
        for row in &batch.rows {
            serde_json::to_writer(&mut buf, row)?;
            buf.push(b'\n');
        }
        self.writer.write_all(&buf).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Keeps every batch in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    batches: Arc<Mutex<Vec<Batch>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Batch> {
        match self.batches.lock() {
            Ok(batches) => batches.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl RowSink for MemorySink {
    async fn write_batch(&mut self, batch: &Batch) -> Result<(), SinkError> {
        match self.batches.lock() {
            Ok(mut batches) => batches.push(batch.clone()),
            Err(poisoned) => poisoned.into_inner().push(batch.clone()),
        }
        Ok(())
    }
}
