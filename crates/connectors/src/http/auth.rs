use reqwest::RequestBuilder;
use std::fmt;

/// Bearer credential attached to outgoing requests. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        BearerToken(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Adds the `Authorization` header when a token is configured.
pub fn authorize(builder: RequestBuilder, token: Option<&BearerToken>) -> RequestBuilder {
    match token {
        Some(token) => token.apply(builder),
        None => builder,
    }
}
