use crate::{error::ProgressError, state::ProgressStore};
use engine_config::options::ProgressFallback;
use model::{
    pagination::offset::Offset,
    progress::{ProgressVersion, WriteCondition},
};
use tracing::{info, warn};

/// In-memory view of the stream position.
///
/// `cursor` is the highest offset handed out by `latest_offset`, `committed`
/// the last value made durable. `committed <= cursor` always holds.
/// `condition` guards the next write against concurrent writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTracker {
    committed: Offset,
    cursor: Offset,
    condition: WriteCondition,
}

impl OffsetTracker {
    pub fn new(start: u64, condition: WriteCondition) -> Self {
        OffsetTracker {
            committed: Offset::new(start),
            cursor: Offset::new(start),
            condition,
        }
    }

    /// Seeds the tracker from the durable checkpoint.
    pub async fn load(
        store: &dyn ProgressStore,
        fallback: ProgressFallback,
    ) -> Result<Self, ProgressError> {
        match store.load().await {
            Ok(Some(stored)) => {
                info!(
                    "Resuming from offset {} stored at {}",
                    stored.record.current,
                    store.location()
                );
                Ok(Self::new(stored.record.current, stored.write_condition()))
            }
            Ok(None) => {
                info!("No checkpoint at {}, starting from offset 0", store.location());
                Ok(Self::new(0, WriteCondition::Absent))
            }
            Err(err) => match fallback {
                ProgressFallback::Fail => Err(err),
                ProgressFallback::Zero => {
                    // Whatever is stored is unreadable, so the first commit replaces it
                    warn!("Could not load checkpoint ({}), starting from offset 0", err);
                    Ok(Self::new(0, WriteCondition::Any))
                }
            },
        }
    }

    pub fn initial(&self) -> Offset {
        self.committed
    }

    /// Current cursor, i.e. the end of the last batch handed out.
    pub fn snapshot(&self) -> Offset {
        self.cursor
    }

    pub fn committed(&self) -> Offset {
        self.committed
    }

    pub fn write_condition(&self) -> &WriteCondition {
        &self.condition
    }

    /// Rows handed out but not yet committed.
    pub fn pending(&self) -> u64 {
        self.committed.distance_to(&self.cursor)
    }

    pub fn advance(&mut self, rows: u64) -> Offset {
        self.cursor = self.cursor.advance(rows);
        self.cursor
    }

    /// Records that the current cursor is durable at `version`.
    pub fn mark_committed(&mut self, version: Option<ProgressVersion>) {
        self.committed = self.cursor;
        self.condition = match version {
            Some(version) => WriteCondition::Matches(version),
            None => WriteCondition::Any,
        };
    }
}
