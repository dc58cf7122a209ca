use crate::{
    error::ProgressError,
    state::{http_store::HttpProgressStore, sled_store::SledProgressStore},
};
use async_trait::async_trait;
use connectors::http::{auth::BearerToken, retry::RetryPolicy};
use engine_config::options::ProgressLocation;
use model::progress::{ProgressRecord, ProgressVersion, StoredProgress, WriteCondition};
use reqwest::Client;
use std::sync::Arc;

pub mod http_store;
mod models;
pub mod sled_store;

/// Durable home of the single checkpoint record.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Reads the record. `None` means nothing has been committed yet.
    async fn load(&self) -> Result<Option<StoredProgress>, ProgressError>;

    /// Writes the record and returns the new version, if the store reports one.
    ///
    /// A write whose `condition` does not hold against the stored record
    /// fails with [`ProgressError::Conflict`] and leaves the record untouched.
    async fn save(
        &self,
        record: &ProgressRecord,
        condition: &WriteCondition,
    ) -> Result<Option<ProgressVersion>, ProgressError>;

    /// Human readable location used in logs and errors.
    fn location(&self) -> String;
}

pub fn open_progress_store(
    location: &ProgressLocation,
    client: &Client,
    token: Option<BearerToken>,
    retry: RetryPolicy,
) -> Result<Arc<dyn ProgressStore>, ProgressError> {
    match location {
        ProgressLocation::Http(url) => Ok(Arc::new(HttpProgressStore::new(
            client.clone(),
            url.clone(),
            token,
            retry,
        ))),
        ProgressLocation::Local { path, key } => Ok(Arc::new(SledProgressStore::open(path, key)?)),
    }
}
