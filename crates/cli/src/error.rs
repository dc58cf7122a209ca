use engine_config::error::OptionsError;
use engine_core::error::{ConnectorError, ProgressError};
use engine_runtime::error::DriverError;
use thiserror::Error;
use workspace_client::error::{ApiError, RepoError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid connector options: {0}")]
    Options(#[from] OptionsError),

    #[error("Failed to start the stream reader: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Progress store error: {0}")]
    Progress(#[from] ProgressError),

    #[error("Streaming failed: {0}")]
    Driver(#[from] DriverError),

    #[error("Workspace API error: {0}")]
    Api(#[from] ApiError),

    #[error("Repo error: {0}")]
    Repo(#[from] RepoError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
