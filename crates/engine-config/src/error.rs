use thiserror::Error;

/// Errors raised while turning string options into connector settings.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Missing required option: {0}")]
    Missing(String),

    #[error("Invalid value '{value}' for option '{key}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read options file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse options file {path}: {message}")]
    Parse { path: String, message: String },
}

impl OptionsError {
    pub fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        OptionsError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
