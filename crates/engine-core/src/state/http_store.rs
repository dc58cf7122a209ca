use crate::{error::ProgressError, state::ProgressStore};
use async_trait::async_trait;
use connectors::http::{
    self,
    auth::{BearerToken, authorize},
    error::HttpError,
    retry::RetryPolicy,
};
use model::progress::{ProgressRecord, ProgressVersion, StoredProgress, WriteCondition};
use reqwest::{
    Client, Response, StatusCode, Url,
    header::{CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH},
};
use tracing::{debug, info};

/// Progress document kept behind a remote HTTP endpoint.
///
/// Loads with `GET <url>` and saves with `PUT <url>?overwrite=true`. The
/// `ETag` of each response is kept as the record version and sent back as
/// `If-Match`; the first write sends `If-None-Match: *`. A writer that lost a
/// race gets `412` instead of silently overwriting newer progress.
pub struct HttpProgressStore {
    client: Client,
    url: Url,
    token: Option<BearerToken>,
    retry: RetryPolicy,
}

impl HttpProgressStore {
    pub fn new(client: Client, url: Url, token: Option<BearerToken>, retry: RetryPolicy) -> Self {
        HttpProgressStore {
            client,
            url,
            token,
            retry,
        }
    }

    fn save_url(&self) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("overwrite", "true");
        url
    }

    fn etag(response: &Response) -> Option<ProgressVersion> {
        response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(|value| ProgressVersion(value.to_string()))
    }
}

#[async_trait]
impl ProgressStore for HttpProgressStore {
    async fn load(&self) -> Result<Option<StoredProgress>, ProgressError> {
        let result = http::execute(&self.client, &self.retry, || {
            authorize(self.client.get(self.url.clone()), self.token.as_ref())
        })
        .await;

        let response = match result {
            Ok(response) => response,
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => {
                info!("No progress document at {}", self.url);
                return Ok(None);
            }
            Err(source) => {
                return Err(ProgressError::Load {
                    location: self.location(),
                    source,
                });
            }
        };

        let version = Self::etag(&response);
        let body = response.bytes().await.map_err(|source| ProgressError::Load {
            location: self.location(),
            source: HttpError::Transport {
                url: self.url.to_string(),
                source,
            },
        })?;

        // An existing but empty document counts as "nothing committed yet"
        let record = if body.iter().all(u8::is_ascii_whitespace) {
            ProgressRecord::default()
        } else {
            serde_json::from_slice::<ProgressRecord>(&body).map_err(|e| {
                ProgressError::Malformed {
                    location: self.location(),
                    message: e.to_string(),
                }
            })?
        };

        debug!(current = record.current, version = ?version, "Loaded progress");
        Ok(Some(StoredProgress { record, version }))
    }

    async fn save(
        &self,
        record: &ProgressRecord,
        condition: &WriteCondition,
    ) -> Result<Option<ProgressVersion>, ProgressError> {
        let url = self.save_url();
        let body = serde_json::to_vec(record).map_err(|e| ProgressError::Encoding(e.to_string()))?;

        let result = http::execute(&self.client, &self.retry, || {
            let mut builder = self
                .client
                .put(url.clone())
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
            builder = match condition {
                WriteCondition::Absent => builder.header(IF_NONE_MATCH, "*"),
                WriteCondition::Matches(version) => builder.header(IF_MATCH, version.as_str()),
                WriteCondition::Any => builder,
            };
            authorize(builder, self.token.as_ref())
        })
        .await;

        match result {
            Ok(response) => {
                let version = Self::etag(&response);
                debug!(current = record.current, version = ?version, "Saved progress");
                Ok(version)
            }
            Err(err) if err.status() == Some(StatusCode::PRECONDITION_FAILED) => {
                Err(ProgressError::Conflict {
                    location: self.location(),
                    expected: condition.to_string(),
                })
            }
            Err(source) => Err(ProgressError::Save {
                location: self.location(),
                source,
            }),
        }
    }

    fn location(&self) -> String {
        self.url.to_string()
    }
}
