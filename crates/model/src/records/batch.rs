use crate::{pagination::offset::Offset, records::row::ApiRow};

/// Rows read for one micro-batch, delimited by the offsets the host planned it with.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: u64,
    pub start: Offset, // last committed offset
    pub end: Offset,   // offset committed once this batch is written
    pub rows: Vec<ApiRow>,
}

impl Batch {
    pub fn new(id: u64, start: Offset, end: Offset, rows: Vec<ApiRow>) -> Self {
        Batch {
            id,
            start,
            end,
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.rows.iter().map(|r| r.size_bytes()).sum()
    }
}
