use model::records::row::ApiRow;
use serde_json::Value;

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decodes a page body: a JSON array whose elements each carry
/// `id` (integer), `name`, `email` and `body` (strings). Extra keys are ignored.
pub fn decode_rows(body: &[u8]) -> Result<Vec<ApiRow>, String> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| format!("body is not valid JSON: {e}"))?;

    let items = match value {
        Value::Array(items) => items,
        other => return Err(format!("expected a JSON array, got {}", kind(&other))),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            if !item.is_object() {
                return Err(format!("element {idx} is {}, expected an object", kind(&item)));
            }
            serde_json::from_value::<ApiRow>(item).map_err(|e| format!("element {idx}: {e}"))
        })
        .collect()
}
