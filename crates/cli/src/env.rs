use crate::error::CliError;
use std::{collections::HashMap, fs, path::Path};
use workspace_client::context::{WORKSPACE_TOKEN_ENV, WORKSPACE_URL_ENV, WorkspaceContext};

const MASK: &str = "****";

/// Process environment overlaid with `.env` files.
#[derive(Debug, Clone)]
pub struct EnvManager {
    vars: HashMap<String, String>,
    sensitive_patterns: Vec<String>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
            sensitive_patterns: Self::default_sensitive_patterns(),
        }
    }

    /// Load variables from a .env file. Values from the file win.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CliError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read env file {}: {}", path.display(), e))
        })?;

        self.parse_env_content(&content)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str, CliError> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CliError::Config(format!("Environment variable {key} is not set")))
    }

    /// Workspace credentials from `WORKSPACE_URL` and `WORKSPACE_TOKEN`.
    pub fn workspace_context(&self) -> Result<WorkspaceContext, CliError> {
        let url = self.require(WORKSPACE_URL_ENV)?;
        let token = self.require(WORKSPACE_TOKEN_ENV)?;
        Ok(WorkspaceContext::new(url, token)?)
    }

    /// Replaces `${NAME}` placeholders with variable values.
    pub fn expand(&self, value: &str) -> Result<String, CliError> {
        let mut out = String::with_capacity(value.len());
        let mut rest = value;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| CliError::Config("Unterminated ${...} placeholder".into()))?;
            let name = &after[..end];
            out.push_str(self.require(name)?);
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.sensitive_patterns.iter().any(|p| key.contains(p))
    }

    /// Value safe to print for `key`.
    pub fn display_value<'a>(&self, key: &str, value: &'a str) -> &'a str {
        if self.is_sensitive(key) { MASK } else { value }
    }

    fn parse_env_content(&mut self, content: &str) -> Result<(), CliError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid env file: malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::Config(format!(
                    "Invalid env file: empty key at line {}",
                    line_num + 1
                )));
            }

            self.vars
                .insert(key.to_string(), Self::unquote_value(value).to_string());
        }

        Ok(())
    }

    fn unquote_value(value: &str) -> &str {
        let value = value.trim();
        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return &value[1..value.len() - 1];
            }
        }
        value
    }

    fn default_sensitive_patterns() -> Vec<String> {
        ["password", "passwd", "secret", "token", "key", "auth", "credential", "private"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

impl Default for EnvManager {
    fn default() -> Self {
        Self::new()
    }
}
