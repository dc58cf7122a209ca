use reqwest::StatusCode;
use thiserror::Error;

/// Failures of a single HTTP exchange.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to build request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        last: Box<HttpError>,
    },
}

impl HttpError {
    /// Transport failures, throttling and server errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Transport { .. } => true,
            HttpError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Status code of the final response, looking through exhausted retries.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Body of the final non-2xx response, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            HttpError::Status { body, .. } => Some(body),
            HttpError::RetriesExhausted { last, .. } => last.body(),
            _ => None,
        }
    }
}
