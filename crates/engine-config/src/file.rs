use crate::error::OptionsError;
use serde_json::Value;
use std::{collections::HashMap, path::Path};

/// Reads a flat JSON object of connector options.
///
/// Numbers and booleans are converted to their string form so the result can
/// go through [`crate::options::ConnectorOptions::from_map`]; `null` entries
/// are dropped.
pub fn read_options_file(path: impl AsRef<Path>) -> Result<HashMap<String, String>, OptionsError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| OptionsError::Read {
        path: display.clone(),
        source,
    })?;

    parse_options(&content).map_err(|message| OptionsError::Parse {
        path: display,
        message,
    })
}

pub fn parse_options(content: &str) -> Result<HashMap<String, String>, String> {
    let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let Value::Object(entries) = value else {
        return Err("expected a JSON object of options".into());
    };

    let mut options = HashMap::with_capacity(entries.len());
    for (key, value) in entries {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(format!("option '{key}' must be a scalar value"));
            }
        };
        options.insert(key, value);
    }
    Ok(options)
}

/// Splits a `key=value` override as passed on the command line.
pub fn parse_override(raw: &str) -> Result<(String, String), OptionsError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(OptionsError::invalid(raw, raw, "expected key=value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn stringifies_scalars_and_drops_nulls() {
        let options = parse_options(
            r#"{"api_url": "https://x/rows", "rows_per_batch": 25, "token": null, "x": true}"#,
        )
        .unwrap();

        assert_eq!(options.get("api_url").unwrap(), "https://x/rows");
        assert_eq!(options.get("rows_per_batch").unwrap(), "25");
        assert_eq!(options.get("x").unwrap(), "true");
        assert!(!options.contains_key("token"));
    }

    #[test]
    fn rejects_nested_values() {
        assert!(parse_options(r#"{"host": {"name": "x"}}"#).is_err());
        assert!(parse_options("[1, 2]").is_err());
    }

    #[test]
    fn reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"host": "api.example.com"}}"#).unwrap();

        let options = read_options_file(file.path()).unwrap();
        assert_eq!(options.get("host").unwrap(), "api.example.com");

        let err = read_options_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, OptionsError::Read { .. }));
    }

    #[test]
    fn parses_overrides() {
        assert_eq!(
            parse_override("rows_per_batch=5").unwrap(),
            ("rows_per_batch".to_string(), "5".to_string())
        );
        assert_eq!(
            parse_override("api_url=https://x/?a=b").unwrap().1,
            "https://x/?a=b"
        );
        assert!(parse_override("novalue").is_err());
        assert!(parse_override("=5").is_err());
    }
}
