use crate::{
    error::ConnectorError,
    source::{DataSource, ReaderState, StreamReader},
    state::{ProgressStore, open_progress_store},
    tracker::OffsetTracker,
};
use async_trait::async_trait;
use connectors::{
    api::fetcher::{RowFetcher, RowStream},
    http::build_client,
};
use engine_config::options::{ConnectorOptions, LatestOffsetMode};
use model::{
    core::schema::Schema,
    pagination::{offset::Offset, partition::Partition},
    progress::ProgressRecord,
};
use planner::partition::{PartitionStrategy, strategy_from_config};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Format name the source is registered under.
pub const FORMAT_NAME: &str = "custom_api";

struct ReaderInner {
    state: ReaderState,
    tracker: OffsetTracker,
}

/// Stream reader pulling rows over HTTP and checkpointing the cursor in a
/// [`ProgressStore`].
pub struct HttpPullReader {
    fetcher: RowFetcher,
    planner: Box<dyn PartitionStrategy>,
    store: Arc<dyn ProgressStore>,
    mode: LatestOffsetMode,
    inner: Mutex<ReaderInner>,
}

impl HttpPullReader {
    /// Opens the configured progress store and loads the checkpoint.
    pub async fn connect(options: &ConnectorOptions) -> Result<Self, ConnectorError> {
        let client = build_client(&options.http)?;
        let store = open_progress_store(
            &options.progress,
            &client,
            options.token.clone(),
            options.http.retry.clone(),
        )?;
        Self::build(options, client, store).await
    }

    /// Like [`HttpPullReader::connect`] but with a caller supplied store.
    pub async fn new(
        options: &ConnectorOptions,
        store: Arc<dyn ProgressStore>,
    ) -> Result<Self, ConnectorError> {
        let client = build_client(&options.http)?;
        Self::build(options, client, store).await
    }

    async fn build(
        options: &ConnectorOptions,
        client: reqwest::Client,
        store: Arc<dyn ProgressStore>,
    ) -> Result<Self, ConnectorError> {
        let planner = strategy_from_config(&options.plan_config())?;
        let tracker = OffsetTracker::load(store.as_ref(), options.progress_on_error).await?;
        let fetcher = RowFetcher::new(
            client,
            options.api_url.clone(),
            options.rows_per_batch,
            options.token.clone(),
            options.http.retry.clone(),
        );

        info!(
            "Stream reader for {} ready (progress at {}, {} rows per batch)",
            options.api_url,
            store.location(),
            fetcher.rows_per_batch()
        );

        Ok(HttpPullReader {
            fetcher,
            planner,
            store,
            mode: options.latest_offset_mode,
            inner: Mutex::new(ReaderInner {
                state: ReaderState::Uninitialized,
                tracker,
            }),
        })
    }

    pub async fn state(&self) -> ReaderState {
        self.inner.lock().await.state
    }

    pub async fn cursor(&self) -> Offset {
        self.inner.lock().await.tracker.snapshot()
    }

    pub async fn committed(&self) -> Offset {
        self.inner.lock().await.tracker.committed()
    }

    fn invalid(operation: &'static str, state: ReaderState) -> ConnectorError {
        ConnectorError::InvalidState { operation, state }
    }
}

#[async_trait]
impl StreamReader for HttpPullReader {
    async fn initial_offset(&self) -> Result<Offset, ConnectorError> {
        let mut inner = self.inner.lock().await;
        if inner.state != ReaderState::Uninitialized {
            return Err(Self::invalid("initial_offset", inner.state));
        }

        inner.state = ReaderState::Reading;
        let offset = inner.tracker.initial();
        info!("Starting stream at offset {}", offset);
        Ok(offset)
    }

    async fn latest_offset(&self) -> Result<Offset, ConnectorError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            ReaderState::Closed => return Err(Self::invalid("latest_offset", inner.state)),
            ReaderState::Uninitialized => {
                debug!("latest_offset called before initial_offset, resuming from checkpoint")
            }
            ReaderState::Reading | ReaderState::Committed => {}
        }

        let rows = match self.mode {
            LatestOffsetMode::Fixed => self.fetcher.rows_per_batch(),
            LatestOffsetMode::Probe => {
                self.fetcher
                    .probe(inner.tracker.snapshot().offset)
                    .await?
            }
        };

        let offset = inner.tracker.advance(rows);
        inner.state = ReaderState::Reading;
        debug!(rows, offset = offset.offset, "Advanced cursor");
        Ok(offset)
    }

    fn partitions(&self, start: Offset, end: Offset) -> Result<Vec<Partition>, ConnectorError> {
        let partitions = self.planner.plan(start, end)?;
        debug!("Planned {} partition(s) for [{}, {})", partitions.len(), start, end);
        Ok(partitions)
    }

    fn read(&self, partition: Partition) -> RowStream {
        debug!("Reading {}", partition);
        self.fetcher.read(partition)
    }

    async fn commit(&self, end: Offset) -> Result<(), ConnectorError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            ReaderState::Reading | ReaderState::Committed => {}
            state => return Err(Self::invalid("commit", state)),
        }

        let cursor = inner.tracker.snapshot();
        if end > cursor {
            return Err(ConnectorError::CommitBeyondCursor {
                end: end.offset,
                cursor: cursor.offset,
            });
        }
        if end < cursor {
            warn!(
                "Committing cursor {} while the batch ended at {}; rows in between will not be re-read",
                cursor, end
            );
        }

        let record = ProgressRecord::new(cursor.offset);
        let version = self
            .store
            .save(&record, inner.tracker.write_condition())
            .await?;
        inner.tracker.mark_committed(version);
        inner.state = ReaderState::Committed;

        info!("Committed offset {} to {}", cursor, self.store.location());
        Ok(())
    }

    async fn stop(&self) -> Result<(), ConnectorError> {
        let mut inner = self.inner.lock().await;
        let pending = inner.tracker.pending();
        if pending > 0 {
            warn!(
                "Stopping with {} uncommitted row(s) past offset {}",
                pending,
                inner.tracker.committed()
            );
        }
        inner.state = ReaderState::Closed;
        info!("Stream reader closed");
        Ok(())
    }
}

/// The `custom_api` data source.
#[derive(Debug, Clone)]
pub struct CustomApiSource {
    options: ConnectorOptions,
}

impl CustomApiSource {
    pub fn new(options: ConnectorOptions) -> Self {
        CustomApiSource { options }
    }

    pub fn from_map(raw: &HashMap<String, String>) -> Result<Self, ConnectorError> {
        Ok(Self::new(ConnectorOptions::from_map(raw)?))
    }

    pub fn options(&self) -> &ConnectorOptions {
        &self.options
    }
}

#[async_trait]
impl DataSource for CustomApiSource {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn schema(&self) -> Schema {
        Schema::rows()
    }

    async fn stream_reader(&self) -> Result<Arc<dyn StreamReader>, ConnectorError> {
        let reader = HttpPullReader::connect(&self.options).await?;
        Ok(Arc::new(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ProgressError, state::sled_store::SledProgressStore};
    use model::{core::schema::ROW_SCHEMA, progress::WriteCondition};
    use tempfile::{TempDir, tempdir};

    fn options(dir: &TempDir, extra: &[(&str, &str)]) -> ConnectorOptions {
        let mut raw: HashMap<String, String> = HashMap::from([
            // Never contacted in fixed mode
            ("api_url".to_string(), "http://127.0.0.1:9/comments".to_string()),
            (
                "checkpoint_path".to_string(),
                dir.path().join("progress").display().to_string(),
            ),
        ]);
        for (k, v) in extra {
            raw.insert(k.to_string(), v.to_string());
        }
        ConnectorOptions::from_map(&raw).unwrap()
    }

    async fn seeded_store(dir: &TempDir, current: u64) -> Arc<dyn ProgressStore> {
        let store = SledProgressStore::open(dir.path().join("seeded"), "rows").unwrap();
        store
            .save(&ProgressRecord::new(current), &WriteCondition::Absent)
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn latest_offset_advances_by_batch_size() {
        let dir = tempdir().unwrap();
        let reader = HttpPullReader::connect(&options(&dir, &[])).await.unwrap();

        assert_eq!(reader.initial_offset().await.unwrap(), Offset::ZERO);
        assert_eq!(reader.latest_offset().await.unwrap(), Offset::new(10));
        assert_eq!(reader.latest_offset().await.unwrap(), Offset::new(20));
        assert_eq!(reader.state().await, ReaderState::Reading);
    }

    #[tokio::test]
    async fn resumes_from_stored_checkpoint() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir, 42).await;
        let reader = HttpPullReader::new(&options(&dir, &[]), store).await.unwrap();

        assert_eq!(reader.initial_offset().await.unwrap(), Offset::new(42));
        assert_eq!(reader.latest_offset().await.unwrap(), Offset::new(52));
    }

    #[tokio::test]
    async fn commit_persists_cursor() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir, 42).await;
        let reader = HttpPullReader::new(&options(&dir, &[("rows_per_batch", "5")]), store.clone())
            .await
            .unwrap();

        let start = reader.initial_offset().await.unwrap();
        let end = reader.latest_offset().await.unwrap();
        assert_eq!(reader.partitions(start, end).unwrap()[0].bounds(), (42, 47));

        reader.commit(end).await.unwrap();
        assert_eq!(reader.state().await, ReaderState::Committed);
        assert_eq!(reader.committed().await, Offset::new(47));

        let stored = store.load().await.unwrap().unwrap();
        assert_eq!(stored.record.current, 47);

        // A second commit reuses the version returned by the first
        let end = reader.latest_offset().await.unwrap();
        reader.commit(end).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().record.current, 52);
    }

    #[tokio::test]
    async fn commit_rejects_offsets_past_cursor() {
        let dir = tempdir().unwrap();
        let reader = HttpPullReader::connect(&options(&dir, &[])).await.unwrap();
        reader.initial_offset().await.unwrap();
        reader.latest_offset().await.unwrap();

        let err = reader.commit(Offset::new(11)).await.unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::CommitBeyondCursor { end: 11, cursor: 10 }
        ));
    }

    #[tokio::test]
    async fn concurrent_writer_is_detected() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir, 0).await;
        let reader = HttpPullReader::new(&options(&dir, &[]), store.clone())
            .await
            .unwrap();
        reader.initial_offset().await.unwrap();
        let end = reader.latest_offset().await.unwrap();

        // Someone else moves the checkpoint after we loaded it
        store
            .save(&ProgressRecord::new(99), &WriteCondition::Any)
            .await
            .unwrap();

        let err = reader.commit(end).await.unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Progress(ProgressError::Conflict { .. })
        ));
        assert_eq!(store.load().await.unwrap().unwrap().record.current, 99);
    }

    #[tokio::test]
    async fn jobs_starting_from_empty_store_do_not_overwrite_each_other() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn ProgressStore> =
            Arc::new(SledProgressStore::open(dir.path().join("shared"), "rows").unwrap());

        let first = HttpPullReader::new(&options(&dir, &[]), store.clone())
            .await
            .unwrap();
        let second = HttpPullReader::new(&options(&dir, &[("rows_per_batch", "5")]), store.clone())
            .await
            .unwrap();

        for reader in [&first, &second] {
            reader.initial_offset().await.unwrap();
            reader.latest_offset().await.unwrap();
        }

        first.commit(Offset::new(10)).await.unwrap();
        let err = second.commit(Offset::new(5)).await.unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Progress(ProgressError::Conflict { .. })
        ));
        assert_eq!(store.load().await.unwrap().unwrap().record.current, 10);
    }

    #[tokio::test]
    async fn lifecycle_calls_are_checked() {
        let dir = tempdir().unwrap();
        let reader = HttpPullReader::connect(&options(&dir, &[])).await.unwrap();

        assert!(matches!(
            reader.commit(Offset::ZERO).await,
            Err(ConnectorError::InvalidState { operation: "commit", .. })
        ));

        reader.initial_offset().await.unwrap();
        assert!(reader.initial_offset().await.is_err());

        reader.stop().await.unwrap();
        assert_eq!(reader.state().await, ReaderState::Closed);
        assert!(matches!(
            reader.latest_offset().await,
            Err(ConnectorError::InvalidState {
                state: ReaderState::Closed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn source_reports_name_and_schema() {
        let dir = tempdir().unwrap();
        let source = CustomApiSource::new(options(&dir, &[]));

        assert_eq!(source.name(), "custom_api");
        assert_eq!(source.schema().to_string(), ROW_SCHEMA);

        let reader = source.stream_reader().await.unwrap();
        assert_eq!(reader.initial_offset().await.unwrap(), Offset::ZERO);
    }
}
