use crate::{error::ProgressError, state::ProgressStore};
use model::progress::{ProgressRecord, ProgressVersion, WriteCondition};
use serde::Serialize;
use std::{fmt, sync::Arc};
use tracing::info;

#[derive(Clone)]
pub struct ProgressService {
    pub store: Arc<dyn ProgressStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressStage {
    /// Nothing has been committed yet.
    Empty,
    Checkpointed,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Empty => "Empty",
            ProgressStage::Checkpointed => "Checkpointed",
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressStatus {
    pub location: String,
    pub stage: ProgressStage,
    pub current: u64,
    pub version: Option<String>,
}

impl ProgressService {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        ProgressService { store }
    }

    pub async fn status(&self) -> Result<ProgressStatus, ProgressError> {
        let location = self.store.location();
        let status = match self.store.load().await? {
            Some(stored) => ProgressStatus {
                location,
                stage: ProgressStage::Checkpointed,
                current: stored.record.current,
                version: stored.version.map(|v| v.0),
            },
            None => ProgressStatus {
                location,
                stage: ProgressStage::Empty,
                current: 0,
                version: None,
            },
        };
        Ok(status)
    }

    /// Overwrites the checkpoint, guarded by the version currently stored.
    pub async fn reset(&self, current: u64) -> Result<Option<ProgressVersion>, ProgressError> {
        let condition = match self.store.load().await? {
            Some(stored) => stored.write_condition(),
            None => WriteCondition::Absent,
        };
        let version = self
            .store
            .save(&ProgressRecord::new(current), &condition)
            .await?;
        info!("Reset progress at {} to {}", self.store.location(), current);
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::sled_store::SledProgressStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reports_empty_then_checkpointed() {
        let dir = tempdir().unwrap();
        let service = ProgressService::new(Arc::new(
            SledProgressStore::open(dir.path(), "rows").unwrap(),
        ));

        let status = service.status().await.unwrap();
        assert_eq!(status.stage, ProgressStage::Empty);
        assert_eq!(status.current, 0);

        service.reset(120).await.unwrap();
        let status = service.status().await.unwrap();
        assert_eq!(status.stage, ProgressStage::Checkpointed);
        assert_eq!(status.current, 120);
        assert!(status.version.is_some());
    }
}
