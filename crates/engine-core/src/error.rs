use crate::source::ReaderState;
use connectors::{error::FetchError, http::error::HttpError};
use engine_config::error::OptionsError;
use planner::error::PlanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Failed to load progress from {location}: {source}")]
    Load {
        location: String,
        #[source]
        source: HttpError,
    },

    #[error("Failed to save progress to {location}: {source}")]
    Save {
        location: String,
        #[source]
        source: HttpError,
    },

    /// Another writer updated the record since it was read.
    #[error("Progress at {location} was modified concurrently (expected {expected})")]
    Conflict { location: String, expected: String },

    #[error("Malformed progress document at {location}: {message}")]
    Malformed { location: String, message: String },

    #[error("Local progress store error: {0}")]
    Local(#[from] sled::Error),

    #[error("Failed to encode progress record: {0}")]
    Encoding(String),
}

/// Errors surfaced to the host runtime by the connector callbacks.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Cannot call {operation} while the reader is {state}")]
    InvalidState {
        operation: &'static str,
        state: ReaderState,
    },

    #[error("Commit offset {end} is past the advertised offset {cursor}")]
    CommitBeyondCursor { end: u64, cursor: u64 },

    #[error("Progress error: {0}")]
    Progress(#[from] ProgressError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Configuration error: {0}")]
    Options(#[from] OptionsError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
}
