use crate::http::error::HttpError;
use thiserror::Error;

/// Errors raised while reading rows for a partition.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The page request failed (transport or non-2xx status).
    #[error("Failed to fetch rows at offset {start} (limit {limit}): {source}")]
    Request {
        start: u64,
        limit: u64,
        #[source]
        source: HttpError,
    },

    /// The page was received but is not a JSON array of row objects.
    #[error("Malformed rows response at offset {start}: {message}")]
    Malformed { start: u64, message: String },
}
