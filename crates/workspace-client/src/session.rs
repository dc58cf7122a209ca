use crate::{context::WorkspaceContext, error::ApiError};
use connectors::http::{
    self, HttpSettings,
    auth::{BearerToken, authorize},
    error::HttpError,
    retry::RetryPolicy,
};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{fmt, str::FromStr};
use tracing::debug;

/// REST APIs the session knows how to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceApi {
    Repos,
    Sql,
}

impl WorkspaceApi {
    pub fn base_path(&self) -> &'static str {
        match self {
            WorkspaceApi::Repos => "/api/2.0/repos",
            WorkspaceApi::Sql => "/api/2.0/sql",
        }
    }
}

impl FromStr for WorkspaceApi {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repos" => Ok(WorkspaceApi::Repos),
            "sql" => Ok(WorkspaceApi::Sql),
            other => Err(ApiError::NotImplemented(other.to_string())),
        }
    }
}

impl fmt::Display for WorkspaceApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceApi::Repos => f.write_str("repos"),
            WorkspaceApi::Sql => f.write_str("sql"),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    error_code: String,
}

/// Authenticated session against one workspace API.
#[derive(Debug, Clone)]
pub struct ApiSession {
    client: Client,
    api: WorkspaceApi,
    base_url: String,
    token: BearerToken,
    retry: RetryPolicy,
}

impl ApiSession {
    pub fn new(api: &str, ctx: &WorkspaceContext) -> Result<Self, ApiError> {
        Self::with_settings(api, ctx, &HttpSettings::default())
    }

    pub fn with_settings(
        api: &str,
        ctx: &WorkspaceContext,
        settings: &HttpSettings,
    ) -> Result<Self, ApiError> {
        let api: WorkspaceApi = api.parse()?;
        let client = http::build_client(settings)?;
        Ok(ApiSession {
            client,
            api,
            base_url: format!("{}{}", ctx.base(), api.base_path()),
            token: ctx.token.clone(),
            retry: settings.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `rel_url` is appended to the API base after a single `/`.
    pub fn url(&self, rel_url: &str) -> String {
        format!("{}/{}", self.base_url, rel_url.trim_start_matches('/'))
    }

    /// Sends a request with the session's bearer token.
    ///
    /// Only `GET` requests are retried. HTTP 400 responses are turned into
    /// [`ApiError::BadRequest`] using the upstream `message` and `error_code`.
    pub async fn request<Q, B>(
        &self,
        method: Method,
        rel_url: &str,
        query: Option<&Q>,
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let url = self.url(rel_url);
        let no_retry = RetryPolicy::none();
        let policy = if method == Method::GET {
            &self.retry
        } else {
            &no_retry
        };

        debug!("{} {} ({})", method, url, self.api);
        let result = http::execute(&self.client, policy, || {
            let mut builder = self.client.request(method.clone(), &url);
            if let Some(query) = query {
                builder = builder.query(query);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }
            authorize(builder, Some(&self.token))
        })
        .await;

        result.map_err(|err| match err.status() {
            Some(StatusCode::BAD_REQUEST) => bad_request(&err).unwrap_or(ApiError::Http(err)),
            _ => ApiError::Http(err),
        })
    }

    /// Like [`ApiSession::request`] but decodes the JSON response.
    pub async fn request_json<T, Q, B>(
        &self,
        method: Method,
        rel_url: &str,
        query: Option<&Q>,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let response = self.request(method, rel_url, query, body).await?;
        Ok(http::read_json(response).await?)
    }
}

fn bad_request(err: &HttpError) -> Option<ApiError> {
    let body: ErrorBody = serde_json::from_str(err.body()?).ok()?;
    Some(ApiError::BadRequest {
        message: body.message,
        error_code: body.error_code,
    })
}

/// Placeholder for requests without a query string or body.
pub const NONE: Option<&Value> = None;
