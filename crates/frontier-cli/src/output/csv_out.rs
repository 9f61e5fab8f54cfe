use serde_json::Value;
use std::io;

use super::{format_scalar, weight_rows};

/// Write output as CSV to stdout.
///
/// Weight envelopes become `fund,weight` rows; anything else is written as
/// `field,value` pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    if let Some(rows) = weight_rows(value) {
        let _ = wtr.write_record(["fund", "weight"]);
        for (fund, weight) in &rows {
            let _ = wtr.write_record([fund.as_str(), weight.as_str()]);
        }
    } else {
        let fields = value
            .as_object()
            .and_then(|m| m.get("result"))
            .unwrap_or(value);
        let _ = wtr.write_record(["field", "value"]);
        match fields {
            Value::Object(map) => {
                for (key, val) in map {
                    let _ = wtr.write_record([key.as_str(), &format_scalar(val)]);
                }
            }
            other => {
                let _ = wtr.write_record(["value", &format_scalar(other)]);
            }
        }
    }

    let _ = wtr.flush();
}
