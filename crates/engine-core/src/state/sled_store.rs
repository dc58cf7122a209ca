use crate::{
    error::ProgressError,
    state::{ProgressStore, models::LocalEntry},
};
use async_trait::async_trait;
use model::progress::{ProgressRecord, ProgressVersion, StoredProgress, WriteCondition};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;

/// Keeps the checkpoint in a local sled database.
///
/// Every write bumps a counter that doubles as the record version, so the
/// same conditional-write rules apply as for the HTTP document store.
pub struct SledProgressStore {
    db: sled::Db,
    key: String,
    location: String,
}

impl SledProgressStore {
    pub fn open(path: impl AsRef<Path>, key: &str) -> Result<Self, ProgressError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        Ok(Self {
            db,
            key: Self::progress_key(key),
            location: format!("{}#{}", path.display(), key),
        })
    }

    #[inline]
    fn progress_key(key: &str) -> String {
        format!("progress:{}", key)
    }

    fn decode(&self, bytes: &[u8]) -> Result<LocalEntry, ProgressError> {
        bincode::deserialize(bytes).map_err(|e| ProgressError::Malformed {
            location: self.location.clone(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ProgressStore for SledProgressStore {
    async fn load(&self) -> Result<Option<StoredProgress>, ProgressError> {
        match self.db.get(&self.key)? {
            Some(bytes) => {
                let entry = self.decode(&bytes)?;
                Ok(Some(StoredProgress {
                    record: ProgressRecord::new(entry.current),
                    version: Some(ProgressVersion(entry.version.to_string())),
                }))
            }
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        record: &ProgressRecord,
        condition: &WriteCondition,
    ) -> Result<Option<ProgressVersion>, ProgressError> {
        // Compare and bump inside one transaction so concurrent writers
        // cannot both succeed against the same version.
        let result = self.db.transaction::<_, _, ProgressError>(|tx_db| {
            let found = match tx_db.get(&self.key)? {
                Some(bytes) => Some(
                    self.decode(&bytes)
                        .map_err(ConflictableTransactionError::Abort)?
                        .version,
                ),
                None => None,
            };

            let holds = match (condition, found) {
                (WriteCondition::Any, _) => true,
                (WriteCondition::Absent, found) => found.is_none(),
                (WriteCondition::Matches(expected), Some(found)) => {
                    expected.as_str() == found.to_string()
                }
                (WriteCondition::Matches(_), None) => false,
            };
            if !holds {
                return Err(ConflictableTransactionError::Abort(ProgressError::Conflict {
                    location: self.location.clone(),
                    expected: condition.to_string(),
                }));
            }

            let entry = LocalEntry {
                current: record.current,
                version: found.unwrap_or(0) + 1,
            };
            let bytes = bincode::serialize(&entry).map_err(|e| {
                ConflictableTransactionError::Abort(ProgressError::Encoding(e.to_string()))
            })?;
            tx_db.insert(self.key.as_bytes(), bytes)?;
            Ok(entry.version)
        });

        let version = match result {
            Ok(version) => version,
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(ProgressError::Local(e)),
        };

        self.db.flush_async().await?;
        Ok(Some(ProgressVersion(version.to_string())))
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn empty_store_loads_nothing() {
        let dir = tempdir().unwrap();
        let store = SledProgressStore::open(dir.path(), "rows").unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_bumps_version_and_persists() {
        let dir = tempdir().unwrap();
        let store = SledProgressStore::open(dir.path(), "rows").unwrap();

        let v1 = store
            .save(&ProgressRecord::new(10), &WriteCondition::Absent)
            .await
            .unwrap()
            .unwrap();
        let v2 = store
            .save(&ProgressRecord::new(20), &WriteCondition::Matches(v1.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(v1, v2);

        let stored = store.load().await.unwrap().unwrap();
        assert_eq!(stored.record.current, 20);
        assert_eq!(stored.version, Some(v2));
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let dir = tempdir().unwrap();
        let store = SledProgressStore::open(dir.path(), "rows").unwrap();

        let v1 = store
            .save(&ProgressRecord::new(10), &WriteCondition::Absent)
            .await
            .unwrap()
            .unwrap();
        store
            .save(&ProgressRecord::new(20), &WriteCondition::Matches(v1.clone()))
            .await
            .unwrap();

        let err = store
            .save(&ProgressRecord::new(30), &WriteCondition::Matches(v1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::Conflict { .. }));
        assert_eq!(store.load().await.unwrap().unwrap().record.current, 20);
    }

    #[tokio::test]
    async fn create_only_write_fails_once_a_record_exists() {
        let dir = tempdir().unwrap();
        let store = SledProgressStore::open(dir.path(), "rows").unwrap();

        // Both writers saw an empty store
        store
            .save(&ProgressRecord::new(10), &WriteCondition::Absent)
            .await
            .unwrap();
        let err = store
            .save(&ProgressRecord::new(5), &WriteCondition::Absent)
            .await
            .unwrap_err();

        assert!(matches!(err, ProgressError::Conflict { .. }));
        assert_eq!(store.load().await.unwrap().unwrap().record.current, 10);
    }

    #[tokio::test]
    async fn unconditional_write_overwrites() {
        let dir = tempdir().unwrap();
        let store = SledProgressStore::open(dir.path(), "rows").unwrap();
        store
            .save(&ProgressRecord::new(10), &WriteCondition::Absent)
            .await
            .unwrap();
        store
            .save(&ProgressRecord::new(3), &WriteCondition::Any)
            .await
            .unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().record.current, 3);

        let err = SledProgressStore::open(dir.path().join("other"), "rows")
            .unwrap()
            .save(
                &ProgressRecord::new(1),
                &WriteCondition::Matches(ProgressVersion("1".into())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::Conflict { .. }));
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let dir = tempdir().unwrap();
        {
            let a = SledProgressStore::open(dir.path(), "a").unwrap();
            a.save(&ProgressRecord::new(5), &WriteCondition::Any)
                .await
                .unwrap();
        }
        let b = SledProgressStore::open(dir.path(), "b").unwrap();
        assert!(b.load().await.unwrap().is_none());
    }
}
