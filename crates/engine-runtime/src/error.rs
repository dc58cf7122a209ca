use connectors::error::FetchError;
use engine_core::error::ConnectorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write rows: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode row: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors that end a streaming run.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Failed to read {partition}: {source}")]
    Read {
        partition: String,
        #[source]
        source: FetchError,
    },

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// A partition read task was cancelled or panicked.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
