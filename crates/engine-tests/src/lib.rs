#![allow(dead_code)]

//! In-process fake of the rows API and the progress document, used by the
//! connector and driver tests.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use engine_config::options::ConnectorOptions;
use model::records::row::ApiRow;
use serde_json::json;
use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::net::TcpListener;

pub mod integration;

pub const TEST_TOKEN: &str = "test-token";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query_u64(&self, key: &str) -> Option<u64> {
        self.query.get(key).and_then(|v| v.parse().ok())
    }
}

#[derive(Default)]
struct Inner {
    rows: Vec<ApiRow>,
    /// `(current, version)`; `None` answers 404.
    progress: Option<(u64, u64)>,
    /// Raw progress body served instead of `{"current": n}`.
    progress_body: Option<String>,
    progress_failures: VecDeque<StatusCode>,
    row_failures: VecDeque<StatusCode>,
    malformed_rows: bool,
    /// Rows appended to every page beyond `_limit`.
    extra_rows: usize,
    requests: Vec<RecordedRequest>,
}

#[derive(Clone, Default)]
pub struct FakeApi {
    inner: Arc<Mutex<Inner>>,
}

impl FakeApi {
    pub fn with_rows(count: usize) -> Self {
        let api = FakeApi::default();
        api.lock().rows = (0..count)
            .map(|i| {
                ApiRow::new(
                    i as i64 + 1,
                    format!("name {}", i + 1),
                    format!("user{}@example.com", i + 1),
                    format!("body {}", i + 1),
                )
            })
            .collect();
        api
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn set_progress(&self, current: u64) {
        let mut inner = self.lock();
        let version = inner.progress.map(|(_, v)| v + 1).unwrap_or(1);
        inner.progress = Some((current, version));
    }

    pub fn set_progress_body(&self, body: &str) {
        let mut inner = self.lock();
        inner.progress_body = Some(body.to_string());
        inner.progress.get_or_insert((0, 1));
    }

    pub fn progress(&self) -> Option<u64> {
        self.lock().progress.map(|(current, _)| current)
    }

    pub fn fail_progress(&self, status: StatusCode, times: usize) {
        self.lock().progress_failures.extend(std::iter::repeat_n(status, times));
    }

    pub fn fail_rows(&self, status: StatusCode, times: usize) {
        self.lock().row_failures.extend(std::iter::repeat_n(status, times));
    }

    pub fn serve_malformed_rows(&self) {
        self.lock().malformed_rows = true;
    }

    /// Makes every page ignore `_limit` and return `extra` more rows.
    pub fn overfill_pages(&self, extra: usize) {
        self.lock().extra_rows = extra;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    fn record(
        &self,
        method: &str,
        path: &str,
        query: HashMap<String, String>,
        headers: HeaderMap,
        body: &[u8],
    ) {
        self.lock().requests.push(RecordedRequest {
            method: method.to_string(),
            path: path.to_string(),
            query,
            headers,
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    /// Starts the server on an ephemeral port.
    pub async fn spawn(&self) -> SocketAddr {
        let app = Router::new()
            .route("/comments", get(rows))
            .route("/progress.json", get(load_progress).put(save_progress))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

fn etag(version: u64) -> String {
    format!("\"v{version}\"")
}

async fn rows(
    State(api): State<FakeApi>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    api.record("GET", "/comments", query.clone(), headers, &[]);
    let mut inner = api.lock();

    if let Some(status) = inner.row_failures.pop_front() {
        return (status, "injected failure").into_response();
    }
    if inner.malformed_rows {
        return Json(json!({"rows": "not an array"})).into_response();
    }

    let start = query.get("_start").and_then(|v| v.parse().ok()).unwrap_or(0usize);
    let limit = query.get("_limit").and_then(|v| v.parse().ok()).unwrap_or(10usize);
    let end = (start + limit + inner.extra_rows).min(inner.rows.len());
    let page = inner.rows.get(start..end).unwrap_or_default().to_vec();
    Json(page).into_response()
}

async fn load_progress(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    api.record("GET", "/progress.json", HashMap::new(), headers, &[]);
    let mut inner = api.lock();

    if let Some(status) = inner.progress_failures.pop_front() {
        return (status, "injected failure").into_response();
    }
    let Some((current, version)) = inner.progress else {
        return (StatusCode::NOT_FOUND, "no such file").into_response();
    };

    let body = inner
        .progress_body
        .clone()
        .unwrap_or_else(|| json!({ "current": current }).to_string());
    (
        StatusCode::OK,
        [
            (header::ETAG, etag(version)),
            (header::CONTENT_TYPE, "application/json".to_string()),
        ],
        body,
    )
        .into_response()
}

async fn save_progress(
    State(api): State<FakeApi>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let if_match = headers
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let create_only = headers
        .get(header::IF_NONE_MATCH)
        .is_some_and(|v| v.as_bytes() == b"*");
    api.record("PUT", "/progress.json", query, headers, &body);
    let mut inner = api.lock();

    if let Some(status) = inner.progress_failures.pop_front() {
        return (status, "injected failure").into_response();
    }

    if create_only && inner.progress.is_some() {
        return (StatusCode::PRECONDITION_FAILED, "already exists").into_response();
    }
    let version = inner.progress.map(|(_, v)| v).unwrap_or(0);
    if let Some(expected) = if_match {
        if expected != etag(version) {
            return (StatusCode::PRECONDITION_FAILED, "stale version").into_response();
        }
    }

    let Ok(record) = serde_json::from_slice::<serde_json::Value>(&body) else {
        return (StatusCode::BAD_REQUEST, "bad body").into_response();
    };
    let current = record["current"].as_u64().unwrap_or(0);
    inner.progress = Some((current, version + 1));
    inner.progress_body = None;

    (StatusCode::OK, [(header::ETAG, etag(version + 1))], "").into_response()
}

/// Connector options pointing at a running fake.
pub fn options_for(addr: SocketAddr, extra: &[(&str, &str)]) -> ConnectorOptions {
    let mut raw: HashMap<String, String> = HashMap::from([
        ("api_url".to_string(), format!("http://{addr}/comments")),
        ("progress_path".to_string(), format!("http://{addr}/progress.json")),
        ("token".to_string(), TEST_TOKEN.to_string()),
        ("retry_base_delay_ms".to_string(), "1".to_string()),
    ]);
    for (k, v) in extra {
        raw.insert(k.to_string(), v.to_string());
    }
    ConnectorOptions::from_map(&raw).unwrap()
}
