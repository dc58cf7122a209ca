use crate::{
    api::decode::decode_rows,
    error::FetchError,
    http::{
        self,
        auth::{BearerToken, authorize},
        error::HttpError,
        retry::RetryPolicy,
    },
};
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use model::{pagination::partition::Partition, records::row::ApiRow};
use reqwest::{Client, Url};
use tracing::{debug, warn};

pub type RowStream = BoxStream<'static, Result<ApiRow, FetchError>>;

/// Reads rows from `GET {api_url}?_start=<offset>&_limit=<n>`.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct RowFetcher {
    client: Client,
    api_url: Url,
    rows_per_batch: u64,
    token: Option<BearerToken>,
    retry: RetryPolicy,
}

impl RowFetcher {
    pub fn new(
        client: Client,
        api_url: Url,
        rows_per_batch: u64,
        token: Option<BearerToken>,
        retry: RetryPolicy,
    ) -> Self {
        RowFetcher {
            client,
            api_url,
            rows_per_batch: rows_per_batch.max(1),
            token,
            retry,
        }
    }

    pub fn rows_per_batch(&self) -> u64 {
        self.rows_per_batch
    }

    /// Issues one page request and decodes the response.
    pub async fn fetch_page(&self, start: u64, limit: u64) -> Result<Vec<ApiRow>, FetchError> {
        let response = http::execute(&self.client, &self.retry, || {
            let builder = self
                .client
                .get(self.api_url.clone())
                .query(&[("_start", start), ("_limit", limit)]);
            authorize(builder, self.token.as_ref())
        })
        .await
        .map_err(|source| FetchError::Request {
            start,
            limit,
            source,
        })?;

        let body = response.bytes().await.map_err(|source| FetchError::Request {
            start,
            limit,
            source: HttpError::Transport {
                url: self.api_url.to_string(),
                source,
            },
        })?;

        let rows = decode_rows(&body).map_err(|message| FetchError::Malformed { start, message })?;
        debug!(start, limit, rows = rows.len(), "Fetched page");
        Ok(rows)
    }

    /// Number of rows the source currently has from `start`, capped at one batch.
    pub async fn probe(&self, start: u64) -> Result<u64, FetchError> {
        let rows = self.fetch_page(start, self.rows_per_batch).await?;
        Ok(rows.len() as u64)
    }

    /// Lazily streams the rows of `partition` in response order.
    ///
    /// Pages of at most `rows_per_batch` rows are requested until the
    /// partition is covered or the source returns a short page. Nothing is
    /// requested until the stream is polled, and an empty partition issues
    /// no request at all.
    pub fn read(&self, partition: Partition) -> RowStream {
        let fetcher = self.clone();
        let end = partition.end();

        stream::try_unfold(partition.start(), move |cursor| {
            let fetcher = fetcher.clone();
            async move {
                if cursor >= end {
                    return Ok(None);
                }

                let limit = (end - cursor).min(fetcher.rows_per_batch);
                let mut rows = fetcher.fetch_page(cursor, limit).await?;
                let fetched = rows.len() as u64;

                // Extra rows belong to the next page or partition
                if fetched > limit {
                    warn!(
                        "Source returned {} rows for a page of {} at offset {}, dropping the excess",
                        fetched, limit, cursor
                    );
                    rows.truncate(limit as usize);
                }

                // A short page means the source has nothing more in this range
                let next = if fetched < limit { end } else { cursor + limit };
                let page = stream::iter(rows.into_iter().map(Ok::<ApiRow, FetchError>));
                Ok(Some((page, next)))
            }
        })
        .try_flatten()
        .boxed()
    }
}
