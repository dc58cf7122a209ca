use crate::{errors::ModelError, pagination::offset::Offset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open range `[start, end)` of source rows fetched as one unit of work.
///
/// Partitions are created by the planner for a single batch and never mutated
/// afterwards; `index` is the partition's position within that batch.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    index: usize,
    start: u64,
    end: u64,
}

impl Partition {
    pub fn new(index: usize, start: u64, end: u64) -> Result<Self, ModelError> {
        if start > end {
            return Err(ModelError::InvalidRange { start, end });
        }
        Ok(Partition { index, start, end })
    }

    /// Single partition spanning the whole batch.
    pub fn spanning(start: Offset, end: Offset) -> Result<Self, ModelError> {
        Self::new(0, start.offset, end.offset)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn bounds(&self) -> (u64, u64) {
        (self.start, self.end)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part-{}[{}, {})", self.index, self.start, self.end)
    }
}
