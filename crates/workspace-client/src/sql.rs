use crate::{
    context::WorkspaceContext,
    error::ApiError,
    session::{ApiSession, NONE},
};
use connectors::http::error::HttpError;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

const HISTORY_PATH: &str = "history/queries";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_time_ms: u64,
    pub end_time_ms: u64,
}

/// Arguments of the query-history listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryHistoryFilter {
    pub statuses: Vec<String>,
    pub user_ids: Vec<u64>,
    pub warehouse_ids: Vec<String>,
    pub query_start_time_range: Option<TimeRange>,
    /// Defaults to `true`.
    pub include_metrics: Option<bool>,
    pub max_results: Option<u32>,
}

#[derive(Serialize, Default)]
struct FilterBy<'a> {
    #[serde(skip_serializing_if = "slice_is_empty")]
    statuses: &'a [String],
    #[serde(skip_serializing_if = "slice_is_empty")]
    user_ids: &'a [u64],
    #[serde(skip_serializing_if = "slice_is_empty")]
    warehouse_ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    query_start_time_range: Option<TimeRange>,
}

fn slice_is_empty<T>(values: &&[T]) -> bool {
    values.is_empty()
}

impl FilterBy<'_> {
    fn is_empty(&self) -> bool {
        self.statuses.is_empty()
            && self.user_ids.is_empty()
            && self.warehouse_ids.is_empty()
            && self.query_start_time_range.is_none()
    }
}

#[derive(Serialize)]
struct HistoryRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_by: Option<&'a FilterBy<'a>>,
    include_metrics: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Deserialize)]
struct HistoryPage {
    #[serde(default)]
    has_next_page: bool,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    res: Option<Vec<Map<String, Value>>>,
}

/// Query-history rows in response order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryHistory {
    pub rows: Vec<Map<String, Value>>,
}

impl QueryHistory {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Union of the row keys. Keys are visited row by row and, within a row,
    /// in sorted order, so a column appears where it is first seen.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key);
                }
            }
        }
        columns
    }
}

pub struct DbsqlHandler {
    session: ApiSession,
}

impl DbsqlHandler {
    pub fn new(ctx: &WorkspaceContext) -> Result<Self, ApiError> {
        Ok(Self::with_session(ApiSession::new("sql", ctx)?))
    }

    pub fn with_session(session: ApiSession) -> Self {
        DbsqlHandler { session }
    }

    /// Lists query history, following page tokens until the last page.
    ///
    /// Filters are only sent with the first request; later pages are
    /// addressed by token alone.
    pub async fn list_query_history(
        &self,
        filter: &QueryHistoryFilter,
    ) -> Result<QueryHistory, ApiError> {
        let filter_by = FilterBy {
            statuses: &filter.statuses,
            user_ids: &filter.user_ids,
            warehouse_ids: &filter.warehouse_ids,
            query_start_time_range: filter.query_start_time_range,
        };

        let mut history = QueryHistory::default();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let body = HistoryRequest {
                filter_by: (page_token.is_none() && !filter_by.is_empty()).then_some(&filter_by),
                include_metrics: filter.include_metrics.unwrap_or(true),
                max_results: filter.max_results,
                page_token: page_token.as_deref(),
            };

            let page: HistoryPage = self
                .session
                .request_json(Method::GET, HISTORY_PATH, NONE, Some(&body))
                .await?;
            pages += 1;

            let rows = page.res.unwrap_or_default();
            debug!(page = pages, rows = rows.len(), "Fetched query history page");
            history.rows.extend(rows);

            if !page.has_next_page {
                break;
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => {
                    return Err(ApiError::Http(HttpError::Decode {
                        url: self.session.url(HISTORY_PATH),
                        message: "has_next_page is set but next_page_token is missing".into(),
                    }));
                }
            }
        }

        Ok(history)
    }
}
