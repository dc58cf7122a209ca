use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A partition whose start lies past its end.
    #[error("Invalid partition range: start {start} is greater than end {end}")]
    InvalidRange { start: u64, end: u64 },
}
