use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{format_scalar, weight_rows};

/// Format output as tables: weights first, then the remaining scalar
/// statistics, warnings and methodology.
pub fn print_table(value: &Value) {
    let Some(envelope) = value.as_object() else {
        println!("{}", value);
        return;
    };

    if let Some(rows) = weight_rows(value) {
        let mut builder = Builder::default();
        builder.push_record(["Fund", "Weight"]);
        for (fund, weight) in rows {
            builder.push_record([fund, weight]);
        }
        println!("{}", Table::from(builder));
    }

    if let Some(Value::Object(result)) = envelope.get("result") {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in result {
            match val {
                Value::Array(_) => continue,
                Value::Object(inner) => {
                    for (sub, v) in inner {
                        builder.push_record([format!("{}.{}", key, sub), format_scalar(v)]);
                    }
                }
                _ => {
                    builder.push_record([key.clone(), format_scalar(val)]);
                }
            }
        }
        println!("{}", Table::from(builder));
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}
