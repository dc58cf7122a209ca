use crate::error::ConnectorError;
use async_trait::async_trait;
use connectors::api::fetcher::RowStream;
use model::{
    core::schema::Schema,
    pagination::{offset::Offset, partition::Partition},
};
use std::{fmt, sync::Arc};

/// Lifecycle of a [`StreamReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Uninitialized,
    Reading,
    Committed,
    Closed,
}

impl ReaderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderState::Uninitialized => "uninitialized",
            ReaderState::Reading => "reading",
            ReaderState::Committed => "committed",
            ReaderState::Closed => "closed",
        }
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Micro-batch callbacks invoked by the host runtime.
///
/// For each batch the host calls `latest_offset`, then `partitions` for the
/// range `[previous end, latest)`, reads every partition, and finally
/// `commit`s the batch end. `initial_offset` is called once before the first
/// batch and `stop` once at shutdown.
#[async_trait]
pub trait StreamReader: Send + Sync {
    /// Offset of the last durable checkpoint.
    async fn initial_offset(&self) -> Result<Offset, ConnectorError>;

    /// Advances the in-memory cursor and returns the end of the next batch.
    async fn latest_offset(&self) -> Result<Offset, ConnectorError>;

    fn partitions(&self, start: Offset, end: Offset) -> Result<Vec<Partition>, ConnectorError>;

    /// Lazily fetches the rows of one partition.
    fn read(&self, partition: Partition) -> RowStream;

    /// Durably records that the host finished processing up to `end`.
    async fn commit(&self, end: Offset) -> Result<(), ConnectorError>;

    async fn stop(&self) -> Result<(), ConnectorError>;
}

/// Entry point registered with the host under [`DataSource::name`].
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn stream_reader(&self) -> Result<Arc<dyn StreamReader>, ConnectorError>;
}
