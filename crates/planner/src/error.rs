use model::errors::ModelError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("Cannot plan batch: start offset {start} is past end offset {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("Number of partitions must be at least 1, got {0}")]
    InvalidPartitionCount(usize),

    #[error("Invalid partition: {0}")]
    Partition(#[from] ModelError),
}
