use crate::error::ApiError;
use connectors::http::auth::BearerToken;
use reqwest::Url;

pub const WORKSPACE_URL_ENV: &str = "WORKSPACE_URL";
pub const WORKSPACE_TOKEN_ENV: &str = "WORKSPACE_TOKEN";

/// Workspace address and credentials.
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    pub api_url: Url,
    pub token: BearerToken,
}

impl WorkspaceContext {
    pub fn new(api_url: &str, token: impl Into<String>) -> Result<Self, ApiError> {
        let api_url = Url::parse(api_url).map_err(|_| ApiError::InvalidUrl(api_url.to_string()))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(api_url.to_string()));
        }
        Ok(WorkspaceContext {
            api_url,
            token: BearerToken::new(token),
        })
    }

    /// Base URL without a trailing slash, e.g. `https://host`.
    pub fn base(&self) -> &str {
        self.api_url.as_str().trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_has_no_trailing_slash() {
        let ctx = WorkspaceContext::new("https://adb-1.example.net/", "t").unwrap();
        assert_eq!(ctx.base(), "https://adb-1.example.net");
        assert!(WorkspaceContext::new("ftp://x", "t").is_err());
        assert!(WorkspaceContext::new("not a url", "t").is_err());
    }
}
