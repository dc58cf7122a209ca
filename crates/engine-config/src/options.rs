use crate::error::OptionsError;
use connectors::http::{HttpSettings, auth::BearerToken, retry::RetryPolicy};
use planner::partition::PlanConfig;
use reqwest::Url;
use std::{collections::HashMap, fmt, path::PathBuf, str::FromStr, time::Duration};
use tracing::warn;

pub const DEFAULT_ROWS_PER_BATCH: u64 = 10;
pub const DEFAULT_PROTOCOL: &str = "https";
pub const DEFAULT_METHOD: &str = "GET";

/// Key under which local stores keep the record when the location names a directory.
pub const LOCAL_PROGRESS_KEY: &str = "progress";

const KNOWN_KEYS: &[&str] = &[
    "method",
    "protocol",
    "host",
    "path",
    "api_url",
    "progress_path",
    "checkpoint_path",
    "rows_per_batch",
    "num_partitions",
    "latest_offset_mode",
    "progress_on_error",
    "token",
    "connect_timeout_ms",
    "request_timeout_ms",
    "max_attempts",
    "retry_base_delay_ms",
];

/// How `latest_offset` decides how far the next batch reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatestOffsetMode {
    /// Advance by `rows_per_batch` on every call.
    #[default]
    Fixed,
    /// Ask the source how many rows exist past the cursor (at most one batch).
    Probe,
}

impl FromStr for LatestOffsetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(LatestOffsetMode::Fixed),
            "probe" => Ok(LatestOffsetMode::Probe),
            other => Err(format!("expected 'fixed' or 'probe', got '{other}'")),
        }
    }
}

/// What to do when the stored checkpoint cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressFallback {
    /// Fail connector construction.
    #[default]
    Fail,
    /// Start from offset zero and log a warning.
    Zero,
}

impl FromStr for ProgressFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(ProgressFallback::Fail),
            "zero" => Ok(ProgressFallback::Zero),
            other => Err(format!("expected 'fail' or 'zero', got '{other}'")),
        }
    }
}

/// Where the progress document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressLocation {
    /// Remote document read with GET and written with PUT.
    Http(Url),
    /// Embedded database directory plus the key of the record inside it.
    Local { path: PathBuf, key: String },
}

impl fmt::Display for ProgressLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressLocation::Http(url) => write!(f, "{url}"),
            ProgressLocation::Local { path, key } => write!(f, "{}#{key}", path.display()),
        }
    }
}

/// Validated connector configuration.
#[derive(Debug, Clone)]
pub struct ConnectorOptions {
    pub api_url: Url,
    pub progress: ProgressLocation,
    pub rows_per_batch: u64,
    pub num_partitions: usize,
    pub latest_offset_mode: LatestOffsetMode,
    pub progress_on_error: ProgressFallback,
    pub token: Option<BearerToken>,
    pub http: HttpSettings,
}

impl ConnectorOptions {
    /// Builds the configuration from host-style string options. Keys are
    /// case-insensitive.
    pub fn from_map(raw: &HashMap<String, String>) -> Result<Self, OptionsError> {
        let opts: HashMap<String, String> = raw
            .iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();

        for key in opts.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!("Ignoring unknown connector option '{}'", key);
            }
        }

        let get = |key: &str| opts.get(key).filter(|v| !v.is_empty()).map(String::as_str);

        let method = get("method").unwrap_or(DEFAULT_METHOD);
        if !method.eq_ignore_ascii_case(DEFAULT_METHOD) {
            return Err(OptionsError::invalid(
                "method",
                method,
                "only GET sources are supported",
            ));
        }

        let protocol = get("protocol").unwrap_or(DEFAULT_PROTOCOL);
        if protocol != "http" && protocol != "https" {
            return Err(OptionsError::invalid(
                "protocol",
                protocol,
                "expected 'http' or 'https'",
            ));
        }
        let host = get("host");

        let api_url = match (get("api_url"), host) {
            (Some(url), _) => parse_url("api_url", url)?,
            (None, Some(host)) => {
                let path = get("path").unwrap_or_default().trim_start_matches('/');
                parse_url("host", &format!("{protocol}://{host}/{path}"))?
            }
            (None, None) => return Err(OptionsError::Missing("api_url or host".into())),
        };

        let progress = resolve_progress(
            get("progress_path"),
            get("checkpoint_path"),
            protocol,
            host,
            &api_url,
        )?;

        let rows_per_batch =
            parse_number("rows_per_batch", get("rows_per_batch"), DEFAULT_ROWS_PER_BATCH)?;
        if rows_per_batch == 0 {
            return Err(OptionsError::invalid(
                "rows_per_batch",
                "0",
                "must be greater than zero",
            ));
        }

        let num_partitions = parse_number::<usize>("num_partitions", get("num_partitions"), 1)?;
        if num_partitions == 0 {
            return Err(OptionsError::invalid(
                "num_partitions",
                "0",
                "must be greater than zero",
            ));
        }

        let latest_offset_mode = parse_enum("latest_offset_mode", get("latest_offset_mode"))?;
        let progress_on_error = parse_enum("progress_on_error", get("progress_on_error"))?;

        let defaults = HttpSettings::default();
        let http = HttpSettings {
            connect_timeout: parse_millis(
                "connect_timeout_ms",
                get("connect_timeout_ms"),
                defaults.connect_timeout,
            )?,
            request_timeout: parse_millis(
                "request_timeout_ms",
                get("request_timeout_ms"),
                defaults.request_timeout,
            )?,
            retry: RetryPolicy::new(
                parse_number("max_attempts", get("max_attempts"), defaults.retry.max_attempts)?,
                parse_millis(
                    "retry_base_delay_ms",
                    get("retry_base_delay_ms"),
                    defaults.retry.base_delay,
                )?,
                defaults.retry.max_delay,
            ),
        };

        Ok(ConnectorOptions {
            api_url,
            progress,
            rows_per_batch,
            num_partitions,
            latest_offset_mode,
            progress_on_error,
            token: get("token").map(BearerToken::new),
            http,
        })
    }

    pub fn plan_config(&self) -> PlanConfig {
        PlanConfig {
            num_partitions: self.num_partitions,
        }
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, OptionsError> {
    let url = Url::parse(raw).map_err(|e| OptionsError::invalid(key, raw, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(OptionsError::invalid(key, raw, "expected an http(s) URL"));
    }
    Ok(url)
}

fn parse_number<T>(key: &str, raw: Option<&str>, default: T) -> Result<T, OptionsError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|e: T::Err| OptionsError::invalid(key, value, e.to_string())),
    }
}

fn parse_millis(key: &str, raw: Option<&str>, default: Duration) -> Result<Duration, OptionsError> {
    let default_ms = default.as_millis() as u64;
    Ok(Duration::from_millis(parse_number(key, raw, default_ms)?))
}

fn parse_enum<T>(key: &str, raw: Option<&str>) -> Result<T, OptionsError>
where
    T: FromStr<Err = String> + Default,
{
    match raw {
        None => Ok(T::default()),
        Some(value) => value.parse().map_err(|e| OptionsError::invalid(key, value, e)),
    }
}

fn resolve_progress(
    progress_path: Option<&str>,
    checkpoint_path: Option<&str>,
    protocol: &str,
    host: Option<&str>,
    api_url: &Url,
) -> Result<ProgressLocation, OptionsError> {
    if progress_path.is_some() && checkpoint_path.is_some() {
        warn!("Both 'progress_path' and 'checkpoint_path' are set; using 'progress_path'");
    }

    match (progress_path.or(checkpoint_path), host) {
        (Some(raw), _) if raw.starts_with("http://") || raw.starts_with("https://") => {
            Ok(ProgressLocation::Http(parse_url("progress_path", raw)?))
        }
        // Workspace file APIs are addressed relative to the API host
        (Some(raw), Some(host)) if raw.starts_with("/api/") => Ok(ProgressLocation::Http(
            parse_url("progress_path", &format!("{protocol}://{host}{raw}"))?,
        )),
        (Some(raw), _) => Ok(ProgressLocation::Local {
            path: PathBuf::from(raw),
            key: LOCAL_PROGRESS_KEY.to_string(),
        }),
        (None, _) => {
            let home = dirs::home_dir().ok_or_else(|| {
                OptionsError::Missing("progress_path (no home directory for the default)".into())
            })?;
            Ok(ProgressLocation::Local {
                path: home.join(".pullstream/progress"),
                key: api_url.to_string(),
            })
        }
    }
}
