use crate::http::{
    error::HttpError,
    retry::{RetryDisposition, RetryError, RetryPolicy},
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub mod auth;
pub mod error;
pub mod retry;

const USER_AGENT: &str = concat!("pullstream/", env!("CARGO_PKG_VERSION"));

/// Timeouts and retry behaviour shared by every outgoing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

pub fn build_client(settings: &HttpSettings) -> Result<Client, HttpError> {
    Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(HttpError::Client)
}

/// Sends the request produced by `build`, retrying transient failures under `policy`.
///
/// `build` is invoked once per attempt. Non-2xx responses are turned into
/// [`HttpError::Status`].
pub async fn execute<F>(
    client: &Client,
    policy: &RetryPolicy,
    build: F,
) -> Result<Response, HttpError>
where
    F: Fn() -> RequestBuilder,
{
    policy
        .run(
            || {
                let builder = build();
                async move {
                    let request = builder.build().map_err(HttpError::Request)?;
                    let url = request.url().to_string();
                    debug!("{} {}", request.method(), url);

                    let response = client
                        .execute(request)
                        .await
                        .map_err(|source| HttpError::Transport { url, source })?;
                    check_status(response).await
                }
            },
            |err: &HttpError| {
                if err.is_retryable() {
                    RetryDisposition::Retry
                } else {
                    RetryDisposition::Stop
                }
            },
        )
        .await
        .map_err(|err| match err {
            RetryError::AttemptsExceeded { attempts, last } if attempts > 1 => {
                HttpError::RetriesExhausted {
                    attempts,
                    last: Box::new(last),
                }
            }
            other => other.into_inner(),
        })
}

pub async fn check_status(response: Response) -> Result<Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(HttpError::Status { url, status, body })
}

/// Reads the body and decodes it as JSON.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, HttpError> {
    let url = response.url().to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|source| HttpError::Transport {
            url: url.clone(),
            source,
        })?;

    serde_json::from_slice(&bytes).map_err(|e| HttpError::Decode {
        url,
        message: e.to_string(),
    })
}
