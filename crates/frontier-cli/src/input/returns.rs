use clap::ValueEnum;
use serde::Deserialize;
use tracing::debug;

use frontier_core::efficient_frontier::{TangencyConfig, TangencyInput};
use frontier_core::returns_table::coerce_numeric;
use frontier_core::ReturnsTable;

/// Returns file layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Sniff the content, then fall back to the other format
    Auto,
    /// First column is the fund, remaining columns are periods
    Csv,
    /// `{"table": {...}, "config": {...}}` or a bare table
    Json,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonRequest {
    Full(TangencyInput),
    Table(ReturnsTable),
}

/// Parse a returns source into a solver request.
///
/// In `Auto` mode the likely format is tried first (JSON when the text opens
/// with `{`, or the file ends in `.json`; CSV otherwise) and the other one
/// is tried if it fails. Shape checks on the resulting table are left to
/// the solver.
pub fn parse_request(
    text: &str,
    format: InputFormat,
    hint: Option<&str>,
) -> Result<TangencyInput, Box<dyn std::error::Error>> {
    if text.trim().is_empty() {
        return Err("Empty file.".into());
    }

    let attempts: &[InputFormat] = match format {
        InputFormat::Csv => &[InputFormat::Csv],
        InputFormat::Json => &[InputFormat::Json],
        InputFormat::Auto => {
            let looks_json = text.trim_start().starts_with('{');
            let json_ext = hint.is_some_and(|h| h.to_lowercase().ends_with(".json"));
            if looks_json || json_ext {
                &[InputFormat::Json, InputFormat::Csv]
            } else {
                &[InputFormat::Csv, InputFormat::Json]
            }
        }
    };

    let mut failures: Vec<String> = Vec::new();
    for attempt in attempts {
        let parsed = match attempt {
            InputFormat::Json => parse_json(text),
            _ => parse_csv(text).map(|table| TangencyInput {
                table,
                config: TangencyConfig::default(),
            }),
        };
        match parsed {
            Ok(request) => {
                debug!(
                    format = ?attempt,
                    assets = request.table.num_assets(),
                    periods = request.table.num_periods(),
                    "loaded returns table"
                );
                return Ok(request);
            }
            Err(e) => failures.push(format!("{:?}: {}", attempt, e)),
        }
    }

    Err(format!("Could not read returns data ({})", failures.join("; ")).into())
}

fn parse_json(text: &str) -> Result<TangencyInput, Box<dyn std::error::Error>> {
    let request: JsonRequest = serde_json::from_str(text)?;
    Ok(match request {
        JsonRequest::Full(input) => input,
        JsonRequest::Table(table) => TangencyInput {
            table,
            config: TangencyConfig::default(),
        },
    })
}

/// One fund per row: the first column names the fund, the rest are period
/// returns. Unparsable cells become NaN and short rows are padded with NaN.
fn parse_csv(text: &str) -> Result<ReturnsTable, Box<dyn std::error::Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let width = reader.headers()?.len();
    let periods = width.saturating_sub(1);

    let mut assets: Vec<String> = Vec::new();
    let mut returns: Vec<Vec<f64>> = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() > width {
            return Err(format!(
                "Line {} has {} fields but the header has {}",
                i + 2,
                record.len(),
                width
            )
            .into());
        }

        let name = record.get(0).unwrap_or_default().to_string();
        let mut row: Vec<f64> = record.iter().skip(1).map(coerce_numeric).collect();
        row.resize(periods, f64::NAN);

        assets.push(name);
        returns.push(row);
    }

    let numeric = returns.iter().flatten().filter(|v| !v.is_nan()).count();
    if !assets.is_empty() && numeric == 0 {
        return Err("no numeric cells".into());
    }

    Ok(ReturnsTable { assets, returns })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use frontier_core::efficient_frontier::MissingValuePolicy;
    use pretty_assertions::assert_eq;

    const FUNDS_CSV: &str = "\
fund,2024-01,2024-02
Fund A,0.01,0.02
Fund B,0.015,0.005
Fund C,-0.01,0.0
";

    #[test]
    fn test_csv_one_fund_per_row() {
        let req = parse_request(FUNDS_CSV, InputFormat::Csv, None).unwrap();
        assert_eq!(req.table.assets, vec!["Fund A", "Fund B", "Fund C"]);
        assert_eq!(req.table.returns[1], vec![0.015, 0.005]);
        assert_eq!(req.config, TangencyConfig::default());
    }

    #[test]
    fn test_csv_coerces_and_pads() {
        let text = "fund,p1,p2,p3\nA,0.01,n/a,0.03\nB,0.02,0.01\n\n";
        let req = parse_request(text, InputFormat::Csv, None).unwrap();
        assert_eq!(req.table.num_assets(), 2);
        assert!(req.table.returns[0][1].is_nan());
        assert!(req.table.returns[1][2].is_nan());
        assert_eq!(req.table.missing_cells(), 2);
    }

    #[test]
    fn test_csv_too_many_fields_rejected() {
        let text = "fund,p1\nA,0.01,0.02\n";
        assert!(parse_request(text, InputFormat::Csv, None).is_err());
    }

    #[test]
    fn test_header_only_csv_gives_empty_table() {
        let req = parse_request("fund,p1,p2\n", InputFormat::Csv, None).unwrap();
        assert_eq!(req.table.num_assets(), 0);
        assert!(req.table.validate().is_err());
    }

    #[test]
    fn test_empty_text_rejected() {
        let err = parse_request("  \n", InputFormat::Auto, None).unwrap_err();
        assert_eq!(err.to_string(), "Empty file.");
    }

    #[test]
    fn test_json_full_request() {
        let text = r#"{
            "table": {"assets": ["A", "B"], "returns": [[0.01, 0.03], [0.02, 0.0]]},
            "config": {"target_return": 0.012, "missing_values": "reject"}
        }"#;
        let req = parse_request(text, InputFormat::Json, None).unwrap();
        assert_eq!(req.config.target_return, 0.012);
        assert_eq!(req.config.missing_values, MissingValuePolicy::Reject);
        assert_eq!(req.config.regularization, 1e-4);
    }

    #[test]
    fn test_json_bare_table() {
        let text = r#"{"assets": ["A"], "returns": [[0.01, null]]}"#;
        let req = parse_request(text, InputFormat::Auto, None).unwrap();
        assert_eq!(req.table.assets, vec!["A"]);
        assert!(req.table.returns[0][1].is_nan());
    }

    #[test]
    fn test_auto_falls_back_to_json_despite_csv_extension() {
        let text = r#"{"assets": ["A", "B"], "returns": [[0.01, 0.02], [0.03, 0.04]]}"#;
        let req = parse_request(text, InputFormat::Auto, Some("returns.csv")).unwrap();
        assert_eq!(req.table.num_assets(), 2);
    }

    #[test]
    fn test_auto_falls_back_to_csv_despite_json_extension() {
        let req = parse_request(FUNDS_CSV, InputFormat::Auto, Some("returns.JSON")).unwrap();
        assert_eq!(req.table.num_assets(), 3);
    }

    #[test]
    fn test_unreadable_in_both_formats() {
        let text = "name\nnothing here\n";
        let err = parse_request(text, InputFormat::Auto, None).unwrap_err();
        assert!(err.to_string().starts_with("Could not read returns data"));
    }
}
