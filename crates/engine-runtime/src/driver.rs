use crate::{error::DriverError, sink::RowSink};
use engine_core::source::StreamReader;
use futures::TryStreamExt;
use model::{
    pagination::{offset::Offset, partition::Partition},
    records::{batch::Batch, row::ApiRow},
};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    /// Stop after this many batches.
    pub max_batches: Option<u64>,
    /// Stop once a batch comes back short instead of polling for more rows.
    pub stop_when_drained: bool,
    /// Pause after a short batch before asking for the next one.
    pub idle_interval: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        DriverSettings {
            max_batches: None,
            stop_when_drained: true,
            idle_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxBatches,
    Drained,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverReport {
    pub start: Offset,
    pub end: Offset,
    pub batches: u64,
    pub rows: u64,
    pub reason: StopReason,
}

/// Plays the host runtime: asks the reader for batch bounds, reads every
/// partition, hands the rows to the sink, then commits.
pub struct MicroBatchDriver {
    reader: Arc<dyn StreamReader>,
    sink: Box<dyn RowSink>,
    settings: DriverSettings,
    cancel: CancellationToken,
}

impl MicroBatchDriver {
    pub fn new(
        reader: Arc<dyn StreamReader>,
        sink: Box<dyn RowSink>,
        settings: DriverSettings,
        cancel: CancellationToken,
    ) -> Self {
        MicroBatchDriver {
            reader,
            sink,
            settings,
            cancel,
        }
    }

    pub async fn run(mut self) -> Result<DriverReport, DriverError> {
        let result = self.run_batches().await;
        if let Err(err) = &result {
            error!("Streaming stopped: {}", err);
        }

        // Close the reader even when a batch failed
        let stopped = self.reader.stop().await;
        let report = result?;
        stopped?;
        Ok(report)
    }

    async fn run_batches(&mut self) -> Result<DriverReport, DriverError> {
        let initial = self.reader.initial_offset().await?;
        let mut start = initial;
        let mut batches = 0u64;
        let mut rows = 0u64;

        let reason = loop {
            if self.cancel.is_cancelled() {
                warn!("Shutdown requested, stopping before batch {}", batches);
                break StopReason::Cancelled;
            }
            if self.settings.max_batches.is_some_and(|max| batches >= max) {
                break StopReason::MaxBatches;
            }

            let end = self.reader.latest_offset().await?;
            let partitions = self.reader.partitions(start, end)?;
            let fetched = self.read_partitions(partitions).await?;

            let batch = Batch::new(batches, start, end, fetched);
            self.sink.write_batch(&batch).await?;
            self.reader.commit(end).await?;

            info!(
                "Batch {} committed: {} row(s) in [{}, {})",
                batch.id,
                batch.len(),
                start,
                end
            );

            let short = (batch.len() as u64) < start.distance_to(&end) || start == end;
            batches += 1;
            rows += batch.len() as u64;
            start = end;

            if short {
                if self.settings.stop_when_drained {
                    info!("Source drained at offset {}", end);
                    break StopReason::Drained;
                }
                debug!("Short batch, waiting {:?}", self.settings.idle_interval);
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.settings.idle_interval) => {}
                }
            }
        };

        self.sink.flush().await?;
        Ok(DriverReport {
            start: initial,
            end: start,
            batches,
            rows,
            reason,
        })
    }

    /// Reads all partitions concurrently and returns the rows in partition order.
    async fn read_partitions(&self, partitions: Vec<Partition>) -> Result<Vec<ApiRow>, DriverError> {
        let mut tasks = JoinSet::new();
        for partition in partitions {
            let stream = self.reader.read(partition);
            tasks.spawn(async move {
                let rows = stream.try_collect::<Vec<_>>().await;
                (partition, rows)
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (partition, rows) = joined?;
            let rows = rows.map_err(|source| DriverError::Read {
                partition: partition.to_string(),
                source,
            })?;
            results.push((partition.index(), rows));
        }

        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().flat_map(|(_, rows)| rows).collect())
    }
}
