use serde_json::Value;

use super::{format_scalar, weight_rows};

/// Print one `fund weight` line per asset.
pub fn print_minimal(value: &Value) {
    for line in minimal_lines(value) {
        println!("{}", line);
    }
}

/// Falls back to the first field of the result object for envelopes
/// without a weight list.
pub(crate) fn minimal_lines(value: &Value) -> Vec<String> {
    if let Some(rows) = weight_rows(value) {
        return rows
            .into_iter()
            .map(|(fund, weight)| format!("{} {}", fund, weight))
            .collect();
    }

    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result_obj {
        if let Some((key, val)) = map.iter().next() {
            return vec![format!("{}: {}", key, format_scalar(val))];
        }
    }

    vec![format_scalar(result_obj)]
}
