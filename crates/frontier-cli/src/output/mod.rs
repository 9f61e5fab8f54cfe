pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Pretty-print JSON to stdout.
fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}

/// `(fund, weight)` pairs from `result.weights`, if the envelope has them.
pub(crate) fn weight_rows(value: &Value) -> Option<Vec<(String, String)>> {
    let weights = value.get("result")?.get("weights")?.as_array()?;
    weights
        .iter()
        .map(|w| {
            let fund = w.get("fund")?.as_str()?.to_string();
            let weight = w.get("weight")?;
            Some((fund, format_scalar(weight)))
        })
        .collect()
}

pub(crate) fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
